//! Read-only access to the Notes database.
//!
//! Every query runs against the live file, so results are snapshots: the
//! Notes app may change rows between two calls.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OpenFlags, Row, params};
use tracing::debug;

use crate::error::{NotesError, Result};
use crate::note::{Account, Folder, Note};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const NOTE_COLUMNS: &str = "
    n.Z_PK,
    COALESCE(n.ZTITLE1, n.ZTITLE, n.ZSNIPPET),
    n.ZIDENTIFIER,
    n.ZMODIFICATIONDATE,
    n.ZCREATIONDATE,
    f.ZTITLE2";

const NOTE_JOINS: &str = "
    FROM ZICCLOUDSYNCINGOBJECT n
    LEFT JOIN ZICCLOUDSYNCINGOBJECT f ON n.ZFOLDER = f.Z_PK
    LEFT JOIN ZICNOTEDATA nd ON n.ZNOTEDATA = nd.Z_PK";

const LIVE_NOTE: &str = "COALESCE(n.ZMARKEDFORDELETION, 0) = 0";

/// Note rows without a body yet still carry a note title; folders and
/// accounts in the same table do not.
const NOTE_ROW: &str = "(n.ZNOTEDATA IS NOT NULL OR n.ZTITLE1 IS NOT NULL)";

/// Read side of the Notes app: notes, folders and accounts.
pub trait NoteStore {
    /// Every live note, most recently modified first. Bodies are not loaded.
    fn list_notes(&self) -> Result<Vec<Note>>;
    fn note_by_id(&self, id: i64) -> Result<Option<Note>>;
    fn note_by_title(&self, title: &str) -> Result<Option<Note>>;
    /// Case-insensitive substring search over titles, and over extracted
    /// body text unless `title_only` is set.
    fn search(&self, query: &str, title_only: bool) -> Result<Vec<Note>>;
    fn folders(&self) -> Result<Vec<Folder>>;
    fn accounts(&self) -> Result<Vec<Account>>;
}

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    store_uuid: Option<String>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NotesError::StoreUnavailable {
                path: path.to_path_buf(),
                detail: "file not found".to_string(),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| classify(e, path))?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(|e| classify(e, path))?;

        // Older or partial stores lack the metadata table; scripting ids are
        // then unavailable and callers fall back to titles.
        let store_uuid = conn
            .query_row("SELECT Z_UUID FROM Z_METADATA LIMIT 1", params![], |row| {
                row.get::<_, Option<String>>(0)
            })
            .ok()
            .flatten();
        debug!(path = %path.display(), ?store_uuid, "opened notes database");

        Ok(Self { conn, path: path.to_path_buf(), store_uuid })
    }

    fn err(&self, e: rusqlite::Error) -> NotesError {
        classify(e, &self.path)
    }

    fn note_from_row(&self, row: &Row<'_>, with_body: bool) -> rusqlite::Result<Note> {
        let id: i64 = row.get(0)?;
        Ok(Note {
            id,
            title: row.get(1)?,
            identifier: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            modified: row.get(3)?,
            created: row.get(4)?,
            folder: row.get(5)?,
            body: if with_body { row.get(6)? } else { None },
            automation_id: self
                .store_uuid
                .as_ref()
                .map(|uuid| format!("x-coredata://{uuid}/ICNote/p{id}")),
        })
    }

    fn query_notes(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        with_body: bool,
    ) -> Result<Vec<Note>> {
        debug!(sql, "querying notes");
        let mut stmt = self.conn.prepare(sql).map_err(|e| self.err(e))?;
        let rows = stmt
            .query_map(params, |row| self.note_from_row(row, with_body))
            .map_err(|e| self.err(e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| self.err(e))
    }
}

impl NoteStore for SqliteStore {
    fn list_notes(&self) -> Result<Vec<Note>> {
        let sql = format!(
            "SELECT {NOTE_COLUMNS} {NOTE_JOINS}
             WHERE n.ZNOTEDATA IS NOT NULL AND {LIVE_NOTE}
             ORDER BY n.ZMODIFICATIONDATE DESC"
        );
        self.query_notes(&sql, params![], false)
    }

    fn note_by_id(&self, id: i64) -> Result<Option<Note>> {
        let sql = format!(
            "SELECT {NOTE_COLUMNS}, nd.ZDATA {NOTE_JOINS}
             WHERE n.Z_PK = ?1 AND {NOTE_ROW} AND {LIVE_NOTE}"
        );
        Ok(self.query_notes(&sql, params![id], true)?.into_iter().next())
    }

    fn note_by_title(&self, title: &str) -> Result<Option<Note>> {
        let sql = format!(
            "SELECT {NOTE_COLUMNS}, nd.ZDATA {NOTE_JOINS}
             WHERE (n.ZTITLE1 = ?1 OR n.ZTITLE = ?1)
             AND {NOTE_ROW} AND {LIVE_NOTE}
             ORDER BY n.ZMODIFICATIONDATE DESC"
        );
        Ok(self.query_notes(&sql, params![title], true)?.into_iter().next())
    }

    fn search(&self, query: &str, title_only: bool) -> Result<Vec<Note>> {
        if title_only {
            let sql = format!(
                "SELECT {NOTE_COLUMNS} {NOTE_JOINS}
                 WHERE n.ZNOTEDATA IS NOT NULL AND {LIVE_NOTE}
                 AND (n.ZTITLE1 LIKE ?1 ESCAPE '\\'
                      OR n.ZTITLE LIKE ?1 ESCAPE '\\'
                      OR n.ZSNIPPET LIKE ?1 ESCAPE '\\')
                 ORDER BY n.ZMODIFICATIONDATE DESC"
            );
            let pattern = format!("%{}%", escape_like(query));
            return self.query_notes(&sql, params![pattern], false);
        }

        let sql = format!(
            "SELECT {NOTE_COLUMNS}, nd.ZDATA {NOTE_JOINS}
             WHERE n.ZNOTEDATA IS NOT NULL AND {LIVE_NOTE}
             ORDER BY n.ZMODIFICATIONDATE DESC"
        );
        let mut notes = self.query_notes(&sql, params![], true)?;
        notes.retain(|n| n.matches(query, false));
        for note in &mut notes {
            note.body = None;
        }
        debug!(query, hits = notes.len(), "body search finished");
        Ok(notes)
    }

    fn folders(&self) -> Result<Vec<Folder>> {
        let sql = "SELECT Z_PK, ZTITLE2, ZIDENTIFIER, ZACCOUNTNAMEFORACCOUNTLISTSORTING
             FROM ZICCLOUDSYNCINGOBJECT
             WHERE COALESCE(ZMARKEDFORDELETION, 0) = 0
             AND Z_PK IN (SELECT DISTINCT ZFOLDER FROM ZICCLOUDSYNCINGOBJECT WHERE ZFOLDER IS NOT NULL)
             ORDER BY ZACCOUNTNAMEFORACCOUNTLISTSORTING, ZTITLE2";
        let mut stmt = self.conn.prepare(sql).map_err(|e| self.err(e))?;
        let rows = stmt
            .query_map(params![], |row| {
                Ok(Folder {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    identifier: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    account: row.get(3)?,
                })
            })
            .map_err(|e| self.err(e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| self.err(e))
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        let sql = "SELECT DISTINCT ZACCOUNTNAMEFORACCOUNTLISTSORTING, ZACCOUNTTYPE
             FROM ZICCLOUDSYNCINGOBJECT
             WHERE ZACCOUNTNAMEFORACCOUNTLISTSORTING IS NOT NULL
             AND ZACCOUNTTYPE IS NOT NULL
             ORDER BY ZACCOUNTNAMEFORACCOUNTLISTSORTING";
        let mut stmt = self.conn.prepare(sql).map_err(|e| self.err(e))?;
        let rows = stmt
            .query_map(params![], |row| Ok(Account { name: row.get(0)?, kind: row.get(1)? }))
            .map_err(|e| self.err(e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| self.err(e))
    }
}

fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Map SQLite failures onto the kinds the user can act on.
fn classify(err: rusqlite::Error, path: &Path) -> NotesError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => NotesError::StoreLocked,
        Some(ErrorCode::CannotOpen | ErrorCode::PermissionDenied) => {
            NotesError::StoreUnavailable {
                path: path.to_path_buf(),
                detail: err.to_string(),
            }
        }
        _ => NotesError::Store(err.to_string()),
    }
}
