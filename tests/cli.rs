#![allow(deprecated)]

#[allow(unused_imports)]
use assert_cmd::cargo::CommandCargoExt;
use flate2::Compression;
use flate2::write::GzEncoder;
use predicates::prelude::*;
use rusqlite::{Connection, params};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn cmd(db: &Path) -> assert_cmd::Command {
    let mut c = assert_cmd::Command::cargo_bin("notes_cli").unwrap();
    c.env("NOTES_DB_PATH", db)
        .env("NO_COLOR", "1")
        .env("NOTES_OSASCRIPT", "/nonexistent/osascript")
        .env_remove("NOTES_LOG");
    c
}

fn gzip_body(text: &str) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(b"\x08\x00\x12\x10").unwrap();
    enc.write_all(text.as_bytes()).unwrap();
    enc.write_all(b"\x1a\x00").unwrap();
    enc.finish().unwrap()
}

/// Minimal NoteStore.sqlite: two live notes, one deleted, one without a body.
fn write_store(dir: &Path) -> PathBuf {
    let path = dir.join("NoteStore.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Z_METADATA (Z_VERSION INTEGER, Z_UUID TEXT);
         INSERT INTO Z_METADATA VALUES (1, 'STORE-UUID');
         CREATE TABLE ZICNOTEDATA (Z_PK INTEGER PRIMARY KEY, ZDATA BLOB);
         CREATE TABLE ZICCLOUDSYNCINGOBJECT (
            Z_PK INTEGER PRIMARY KEY, ZTITLE TEXT, ZTITLE1 TEXT, ZTITLE2 TEXT,
            ZSNIPPET TEXT, ZIDENTIFIER TEXT, ZMODIFICATIONDATE REAL,
            ZCREATIONDATE REAL, ZFOLDER INTEGER, ZNOTEDATA INTEGER,
            ZMARKEDFORDELETION INTEGER, ZACCOUNTNAMEFORACCOUNTLISTSORTING TEXT,
            ZACCOUNTTYPE INTEGER);
         INSERT INTO ZICCLOUDSYNCINGOBJECT (Z_PK, ZTITLE2, ZIDENTIFIER, ZMARKEDFORDELETION, ZACCOUNTNAMEFORACCOUNTLISTSORTING)
            VALUES (1, 'Work', 'F-1', 0, 'iCloud');
         INSERT INTO ZICCLOUDSYNCINGOBJECT (Z_PK, ZACCOUNTNAMEFORACCOUNTLISTSORTING, ZACCOUNTTYPE, ZMARKEDFORDELETION)
            VALUES (2, 'iCloud', 1, 0);",
    )
    .unwrap();
    let notes: [(i64, &str, f64, Option<i64>, i64, &str); 3] = [
        (10, "Groceries", 700_000_000.0, Some(1), 0, "Groceries\neggs and milk"),
        (11, "Trip plan", 710_000_000.0, None, 0, "Trip plan\nbook the hotel"),
        (12, "Old", 600_000_000.0, Some(1), 1, "Old\ndeleted body"),
    ];
    for (pk, title, modified, folder, deleted, body) in notes {
        conn.execute(
            "INSERT INTO ZICNOTEDATA (Z_PK, ZDATA) VALUES (?1, ?2)",
            params![pk, gzip_body(body)],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ZICCLOUDSYNCINGOBJECT
             (Z_PK, ZTITLE1, ZIDENTIFIER, ZMODIFICATIONDATE, ZCREATIONDATE, ZFOLDER, ZNOTEDATA, ZMARKEDFORDELETION)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?1, ?6)",
            params![pk, title, format!("N-{pk}"), modified, folder, deleted],
        )
        .unwrap();
    }
    // a note row whose body has not been written yet
    conn.execute(
        "INSERT INTO ZICCLOUDSYNCINGOBJECT
         (Z_PK, ZTITLE1, ZIDENTIFIER, ZMODIFICATIONDATE, ZCREATIONDATE, ZFOLDER, ZMARKEDFORDELETION)
         VALUES (13, 'Blank', 'N-13', 650000000.0, 650000000.0, 1, 0)",
        params![],
    )
    .unwrap();
    path
}

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

#[test]
fn help_and_path() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("NoteStore.sqlite");
    cmd(&db)
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("NOTES_DB_PATH"));
    cmd(&db)
        .arg("path")
        .assert()
        .success()
        .stdout(predicate::str::contains("NoteStore.sqlite"));
}

#[test]
fn unknown_command_fails() {
    let temp = TempDir::new().unwrap();
    cmd(&temp.path().join("db"))
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown command: frobnicate"));
}

#[test]
fn missing_database_names_full_disk_access() {
    let temp = TempDir::new().unwrap();
    cmd(&temp.path().join("absent.sqlite"))
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Full Disk Access"));
}

#[test]
fn list_newest_first_and_skips_deleted() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    let out = stdout_of(cmd(&db).arg("list").assert().success());
    let trip = out.find("Trip plan").expect("trip listed");
    let groceries = out.find("Groceries").expect("groceries listed");
    assert!(trip < groceries);
    assert!(!out.contains("Old"));
    assert!(out.contains("Work"));
    assert!(out.contains("Notes"));
}

#[test]
fn list_sort_folder_and_limit() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    let out = stdout_of(
        cmd(&db)
            .args(["list", "--sort", "title", "--asc"])
            .assert()
            .success(),
    );
    assert!(out.find("Groceries").unwrap() < out.find("Trip plan").unwrap());

    let out = stdout_of(cmd(&db).args(["list", "-f", "work"]).assert().success());
    assert!(out.contains("Groceries"));
    assert!(!out.contains("Trip plan"));

    let out = stdout_of(cmd(&db).args(["list", "--limit", "1"]).assert().success());
    assert!(out.contains("Trip plan"));
    assert!(!out.contains("Groceries"));

    cmd(&db)
        .args(["list", "-f", "Archive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No notes in folder \"Archive\"."));
}

#[test]
fn list_rejects_unknown_flag() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    cmd(&db)
        .args(["list", "--tag", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown flag for list: --tag"));
}

#[test]
fn show_by_id_and_by_title() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    cmd(&db)
        .args(["show", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Groceries (10)"))
        .stdout(predicate::str::contains("Folder: Work"))
        .stdout(predicate::str::contains("eggs and milk"));
    cmd(&db)
        .args(["show", "Trip", "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Trip plan (11)"))
        .stdout(predicate::str::contains("Folder: Notes"))
        .stdout(predicate::str::contains("book the hotel"));
}

#[test]
fn show_note_without_body() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    cmd(&db)
        .args(["show", "13"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Blank (13)"))
        .stdout(predicate::str::contains("(no text content)"));
    cmd(&db)
        .args(["show", "Blank"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no text content)"));
}

#[test]
fn show_unknown_and_deleted_notes_fail() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    cmd(&db)
        .args(["show", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Note \"Nope\" not found"));
    cmd(&db)
        .args(["show", "12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn search_body_and_title_only() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    let out = stdout_of(cmd(&db).args(["search", "MILK"]).assert().success());
    assert!(out.contains("Groceries"));
    assert!(!out.contains("Trip plan"));
    assert!(out.contains("1 match"));

    cmd(&db)
        .args(["search", "milk", "--title-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No notes match \"milk\"."));
}

#[test]
fn folders_and_accounts() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    cmd(&db)
        .arg("folders")
        .assert()
        .success()
        .stdout(predicate::str::contains("Work"))
        .stdout(predicate::str::contains("iCloud"));
    cmd(&db)
        .arg("accounts")
        .assert()
        .success()
        .stdout(predicate::str::diff("iCloud\n"));
}

#[test]
fn write_commands_report_missing_interpreter() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    cmd(&db)
        .args(["export", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Notes automation failed"));
}

#[test]
fn create_requires_title() {
    let temp = TempDir::new().unwrap();
    let db = write_store(temp.path());
    cmd(&db)
        .arg("create")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: notes create"));
}

#[cfg(unix)]
mod automation {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    /// Stand-in for osascript: records each script it is given under `dir`
    /// and answers body and modification-date requests.
    fn fake_osascript(dir: &Path, body: &str, stamp_changes: bool) -> PathBuf {
        let log = dir.join("scripts.log");
        let seen = dir.join("stamp-seen");
        let stamp = if stamp_changes {
            format!(
                "if [ -f '{seen}' ]; then echo 2024-01-01T10:05:00; else touch '{seen}'; echo 2024-01-01T10:00:00; fi",
                seen = seen.display()
            )
        } else {
            "echo 2024-01-01T10:00:00".to_string()
        };
        let script = format!(
            "#!/bin/sh\n\
             printf '%s\\n---\\n' \"$2\" >> '{log}'\n\
             case \"$2\" in\n\
               *'modification date'*) {stamp} ;;\n\
               *'return body'*) printf '%s\\n' '{body}' ;;\n\
               *'make new'*) echo 'x-coredata://STORE-UUID/ICNote/p99' ;;\n\
             esac\n",
            log = log.display(),
        );
        let path = dir.join("fake-osascript");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn script_log(dir: &Path) -> String {
        fs::read_to_string(dir.join("scripts.log")).unwrap_or_default()
    }

    fn editor_appending(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("fake-editor");
        fs::write(&path, format!("#!/bin/sh\nprintf '\\n{text}' >> \"$1\"\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn export_decodes_live_body() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "<div><b>Hi</b></div><ul><li>a</li></ul>", false);
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["export", "10"])
            .assert()
            .success()
            .stdout(predicate::str::diff("**Hi**\n\n- a\n"));
        assert!(script_log(temp.path()).contains("x-coredata://STORE-UUID/ICNote/p10"));

        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["export", "10", "--html"])
            .assert()
            .success()
            .stdout(predicate::str::contains("<ul><li>a</li></ul>"));
    }

    #[test]
    fn permission_denied_names_settings() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = temp.path().join("denied-osascript");
        fs::write(
            &osa,
            "#!/bin/sh\necho 'execution error: Not authorized to send Apple events to Notes. (-1743)' >&2\nexit 1\n",
        )
        .unwrap();
        fs::set_permissions(&osa, fs::Permissions::from_mode(0o755)).unwrap();
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["export", "Groceries"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Privacy & Security > Automation"));
    }

    #[test]
    fn create_sends_escaped_title_and_encoded_body() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "", false);
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["create", "Say \"hi\"", "**eggs**", "-f", "Work"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created note \"Say \"hi\"\" in Work"));
        let log = script_log(temp.path());
        assert!(log.contains(r#"name:"Say \"hi\"""#));
        assert!(log.contains("<div><b>eggs</b></div>"));
        assert!(log.contains(r#"folder "Work""#));
    }

    #[test]
    fn create_reads_body_from_stdin() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "", false);
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["create", "List", "--stdin"])
            .write_stdin("- a\n- b\n")
            .assert()
            .success();
        assert!(script_log(temp.path()).contains("<ul>\n<li>a</li>\n<li>b</li>\n</ul>"));
    }

    #[test]
    fn append_encodes_text() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "", false);
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["append", "Trip plan", "pack", "_light_"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Appended to \"Trip plan\""));
        assert!(script_log(temp.path()).contains("<div>pack <i>light</i></div>"));
    }

    #[test]
    fn append_accepts_list_item_text() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "", false);
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["append", "10", "- buy milk"])
            .assert()
            .success();
        assert!(script_log(temp.path()).contains("<ul>\n<li>buy milk</li>\n</ul>"));
    }

    #[test]
    fn delete_declined_does_nothing() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "", false);
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["delete", "10"])
            .write_stdin("n\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing deleted."));
        assert_eq!(script_log(temp.path()), "");

        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .args(["delete", "10", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted \"Groceries\""));
        assert!(script_log(temp.path()).contains("delete note id"));
    }

    #[test]
    fn edit_writes_encoded_changes() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "<div>hello</div>", false);
        let editor = editor_appending(temp.path(), "more");
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .env("VISUAL", &editor)
            .args(["edit", "Groceries"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Updated \"Groceries\""));
        assert!(script_log(temp.path()).contains("<div>hello</div>\n<div>more</div>"));
    }

    #[test]
    fn edit_conflict_declined_is_an_error() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "<div>hello</div>", true);
        let editor = editor_appending(temp.path(), "more");
        let buffers = temp.path().join("tmp");
        fs::create_dir(&buffers).unwrap();
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .env("VISUAL", &editor)
            .env("TMPDIR", &buffers)
            .args(["edit", "10"])
            .write_stdin("n\n")
            .assert()
            .failure()
            .stderr(predicate::str::contains("changed in Notes while you were editing"))
            .stderr(predicate::str::contains("Your edits are saved in"));
        assert!(!script_log(temp.path()).contains("set body"));

        let kept: Vec<PathBuf> = fs::read_dir(&buffers)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(fs::read_to_string(&kept[0]).unwrap(), "hello\nmore");
    }

    #[test]
    fn edit_conflict_forced_overwrites() {
        let temp = TempDir::new().unwrap();
        let db = write_store(temp.path());
        let osa = fake_osascript(temp.path(), "<div>hello</div>", true);
        let editor = editor_appending(temp.path(), "more");
        cmd(&db)
            .env("NOTES_OSASCRIPT", &osa)
            .env("VISUAL", &editor)
            .args(["edit", "10", "--force"])
            .assert()
            .success();
        assert!(script_log(temp.path()).contains("set body"));
    }
}
