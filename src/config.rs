//! Runtime settings, all read from the environment.

use std::env;
use std::path::PathBuf;

use crate::error::{NotesError, Result};

pub const DB_PATH_ENV: &str = "NOTES_DB_PATH";
pub const OSASCRIPT_ENV: &str = "NOTES_OSASCRIPT";
pub const LOG_ENV: &str = "NOTES_LOG";
const DEFAULT_DB_RELATIVE: &str =
    "Library/Group Containers/group.com.apple.notes/NoteStore.sqlite";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub osascript: PathBuf,
    pub editor: String,
    pub use_color: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            db_path: db_path()?,
            osascript: env::var_os(OSASCRIPT_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("osascript")),
            editor: editor(),
            use_color: env::var_os("NO_COLOR").is_none(),
        })
    }
}

pub fn db_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(DB_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = env::var_os("HOME").ok_or_else(|| {
        NotesError::usage(format!(
            "HOME not set; set {DB_PATH_ENV} to the NoteStore.sqlite path"
        ))
    })?;
    Ok(PathBuf::from(home).join(DEFAULT_DB_RELATIVE))
}

fn editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}
