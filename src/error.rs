use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = NotesError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NotesError {
    #[error(
        "Cannot access Notes database at {}: {detail}\n\
         Grant Full Disk Access to your terminal:\n\
         System Settings > Privacy & Security > Full Disk Access > enable your terminal",
        path.display()
    )]
    StoreUnavailable { path: PathBuf, detail: String },

    #[error("Notes database is locked by another process. Close Notes or retry in a moment.")]
    StoreLocked,

    #[error("Database error: {0}")]
    Store(String),

    #[error("Malformed note content: {0}")]
    MalformedContent(String),

    #[error(
        "Notes automation access denied. Grant permission once:\n\
         System Settings > Privacy & Security > Automation > enable Notes for your terminal"
    )]
    AutomationPermissionDenied,

    #[error("Notes automation failed: {0}")]
    AutomationExecutionFailed(String),

    #[error(
        "Note \"{title}\" changed in Notes while you were editing; not overwritten{}",
        kept_at(.saved)
    )]
    EditConflict { title: String, saved: Option<PathBuf> },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn kept_at(saved: &Option<PathBuf>) -> String {
    match saved {
        Some(path) => format!(". Your edits are saved in {}", path.display()),
        None => String::new(),
    }
}

impl NotesError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}
