//! Read-modify-write of a note body with optimistic conflict detection.
//!
//! The Notes app can change a note while it is open in an editor. The stamp
//! captured at [`EditSession::begin`] is compared again right before the
//! write; a mismatch is surfaced instead of silently overwriting.

use tracing::{debug, info};

use crate::automation::{ModStamp, NoteTarget, NotesAutomation};
use crate::error::{NotesError, Result};
use crate::markup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Unchanged,
    Updated,
}

pub struct EditSession<'a, A: NotesAutomation + ?Sized> {
    automation: &'a A,
    target: NoteTarget,
    title: String,
    stamp: ModStamp,
    markup: String,
}

impl<'a, A: NotesAutomation + ?Sized> EditSession<'a, A> {
    /// Capture the modification stamp, then fetch and decode the body.
    pub fn begin(automation: &'a A, target: NoteTarget, title: &str) -> Result<Self> {
        let stamp = automation.modification_stamp(&target)?;
        let html = automation.body(&target)?;
        let markup = markup::decode(&html);
        debug!(?target, stamp = %stamp.0, "edit session started");
        Ok(Self { automation, target, title: title.to_string(), stamp, markup })
    }

    /// Markup handed to the user for editing.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Write `edited` back. When the note changed since [`begin`], `confirm`
    /// decides whether to overwrite; declining returns `EditConflict`.
    ///
    /// [`begin`]: EditSession::begin
    pub fn commit(self, edited: &str, confirm: impl FnOnce(&str) -> bool) -> Result<EditOutcome> {
        if edited.trim_end() == self.markup.trim_end() {
            return Ok(EditOutcome::Unchanged);
        }

        let current = self.automation.modification_stamp(&self.target)?;
        if current != self.stamp {
            info!(before = %self.stamp.0, after = %current.0, "note changed during edit");
            if !confirm(&self.title) {
                return Err(NotesError::EditConflict { title: self.title, saved: None });
            }
        }

        let html = markup::encode(edited);
        self.automation.update_body(&self.target, &html)?;
        Ok(EditOutcome::Updated)
    }
}
