//! Write path into the Notes app through its AppleScript dictionary.
//!
//! Scripts run synchronously via `osascript -e`. Every string spliced into a
//! script goes through [`escape_applescript`].

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{NotesError, Result};

/// How a note is addressed in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteTarget {
    /// Scripting id, e.g. `x-coredata://…/ICNote/p42`.
    Id(String),
    /// First note whose name matches exactly.
    Title(String),
}

impl NoteTarget {
    fn script_ref(&self) -> String {
        match self {
            NoteTarget::Id(id) => format!("note id \"{}\"", escape_applescript(id)),
            NoteTarget::Title(title) => {
                format!("first note whose name is \"{}\"", escape_applescript(title))
            }
        }
    }
}

/// Opaque modification marker. Two stamps differ iff the note changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModStamp(pub String);

/// Operations the app exposes for writing notes.
pub trait NotesAutomation {
    /// Create a note and return its scripting id.
    fn create(&self, title: &str, html: &str, folder: &str, account: Option<&str>)
    -> Result<String>;
    fn body(&self, target: &NoteTarget) -> Result<String>;
    fn modification_stamp(&self, target: &NoteTarget) -> Result<ModStamp>;
    fn update_body(&self, target: &NoteTarget, html: &str) -> Result<()>;
    fn append_body(&self, target: &NoteTarget, html: &str) -> Result<()>;
    fn delete(&self, target: &NoteTarget) -> Result<()>;
    fn create_folder(&self, name: &str, account: Option<&str>) -> Result<String>;
}

/// Escape backslashes, then double quotes, for an AppleScript string literal.
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

pub struct OsaScript {
    program: PathBuf,
}

impl OsaScript {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    /// Run a script and return its trimmed stdout.
    pub fn run(&self, script: &str) -> Result<String> {
        debug!(program = %self.program.display(), "running automation script");
        let output = Command::new(&self.program)
            .arg("-e")
            .arg(script)
            .output()
            .map_err(|e| {
                NotesError::AutomationExecutionFailed(format!(
                    "cannot run {}: {e}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(%stderr, "automation script failed");
            return Err(classify_failure(&stderr));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| {
            NotesError::MalformedContent("automation output is not valid UTF-8".to_string())
        })?;
        Ok(stdout.trim().to_string())
    }
}

/// Map interpreter stderr to an error kind.
pub fn classify_failure(stderr: &str) -> NotesError {
    let lower = stderr.to_lowercase();
    let denied = ["not allowed", "not authorized", "permission", "-1743"]
        .iter()
        .any(|needle| lower.contains(needle));
    if denied {
        return NotesError::AutomationPermissionDenied;
    }
    if stderr.is_empty() {
        return NotesError::AutomationExecutionFailed("script exited with an error".to_string());
    }
    NotesError::AutomationExecutionFailed(stderr.to_string())
}

fn container_ref(folder: &str, account: Option<&str>) -> String {
    let folder = format!("folder \"{}\"", escape_applescript(folder));
    match account {
        Some(acct) => format!("{folder} of account \"{}\"", escape_applescript(acct)),
        None => folder,
    }
}

impl NotesAutomation for OsaScript {
    fn create(
        &self,
        title: &str,
        html: &str,
        folder: &str,
        account: Option<&str>,
    ) -> Result<String> {
        let script = format!(
            r#"tell application "Notes"
    set newNote to make new note at {} with properties {{name:"{}", body:"{}"}}
    return id of newNote
end tell"#,
            container_ref(folder, account),
            escape_applescript(title),
            escape_applescript(html),
        );
        self.run(&script)
    }

    fn body(&self, target: &NoteTarget) -> Result<String> {
        let script = format!(
            r#"tell application "Notes"
    return body of {}
end tell"#,
            target.script_ref()
        );
        self.run(&script)
    }

    fn modification_stamp(&self, target: &NoteTarget) -> Result<ModStamp> {
        // «class isot» renders the date as ISO 8601 regardless of locale
        let script = format!(
            r#"tell application "Notes"
    set d to modification date of {}
end tell
return (d as «class isot» as string)"#,
            target.script_ref()
        );
        self.run(&script).map(ModStamp)
    }

    fn update_body(&self, target: &NoteTarget, html: &str) -> Result<()> {
        let script = format!(
            r#"tell application "Notes"
    set body of {} to "{}"
end tell"#,
            target.script_ref(),
            escape_applescript(html)
        );
        self.run(&script).map(|_| ())
    }

    fn append_body(&self, target: &NoteTarget, html: &str) -> Result<()> {
        let script = format!(
            r#"tell application "Notes"
    set theNote to {}
    set body of theNote to (body of theNote) & "{}"
end tell"#,
            target.script_ref(),
            escape_applescript(html)
        );
        self.run(&script).map(|_| ())
    }

    fn delete(&self, target: &NoteTarget) -> Result<()> {
        let script = format!(
            r#"tell application "Notes"
    delete {}
end tell"#,
            target.script_ref()
        );
        self.run(&script).map(|_| ())
    }

    fn create_folder(&self, name: &str, account: Option<&str>) -> Result<String> {
        let location = account
            .map(|acct| format!(" at account \"{}\"", escape_applescript(acct)))
            .unwrap_or_default();
        let script = format!(
            r#"tell application "Notes"
    set newFolder to make new folder{} with properties {{name:"{}"}}
    return id of newFolder
end tell"#,
            location,
            escape_applescript(name)
        );
        self.run(&script)
    }
}
