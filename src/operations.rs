use tracing::debug;

use crate::args::SortField;
use crate::automation::NoteTarget;
use crate::error::{NotesError, Result};
use crate::note::{Note, cmp_timestamps};
use crate::store::NoteStore;

/// Load a note by database id or exact title. Numeric arguments are tried
/// as an id first, then as a title.
pub fn resolve_note(store: &dyn NoteStore, arg: &str) -> Result<Note> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(NotesError::usage("Provide a note id or title"));
    }
    if let Ok(id) = arg.parse::<i64>() {
        if let Some(note) = store.note_by_id(id)? {
            return Ok(note);
        }
        debug!(id, "no note with this id; trying as a title");
    }
    store
        .note_by_title(arg)?
        .ok_or_else(|| NotesError::NotFound(format!("Note \"{arg}\"")))
}

/// Scripting target for a note: its id when known, else its title.
pub fn target_for(note: &Note) -> NoteTarget {
    match &note.automation_id {
        Some(id) => NoteTarget::Id(id.clone()),
        None => NoteTarget::Title(note.display_title().to_string()),
    }
}

/// Keep notes whose folder matches, ignoring case.
pub fn filter_by_folder(notes: Vec<Note>, folder: Option<&str>) -> Vec<Note> {
    let Some(folder) = folder else { return notes };
    let wanted = folder.to_lowercase();
    notes
        .into_iter()
        .filter(|n| n.folder_name().to_lowercase() == wanted)
        .collect()
}

/// Sort in place; descending unless `ascending`. Ties keep id order.
pub fn sort_notes(notes: &mut [Note], field: SortField, ascending: bool) {
    notes.sort_by(|a, b| {
        let ord = match field {
            SortField::Modified => cmp_timestamps(a.modified, b.modified),
            SortField::Created => cmp_timestamps(a.created, b.created),
            SortField::Title => a
                .display_title()
                .to_lowercase()
                .cmp(&b.display_title().to_lowercase()),
        };
        let ord = if ascending { ord } else { ord.reverse() };
        ord.then_with(|| a.id.cmp(&b.id))
    });
}

/// Apply an optional cap after sorting.
pub fn take_limit(notes: &mut Vec<Note>, limit: Option<usize>) {
    if let Some(n) = limit {
        notes.truncate(n);
    }
}
