use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;

pub mod args;
pub mod automation;
pub mod config;
pub mod edit;
pub mod error;
pub mod extract;
pub mod formatting;
pub mod logging;
pub mod markup;
pub mod note;
pub mod operations;
pub mod render;
pub mod store;

pub mod shared {
    pub mod table;
}

use args::CommonFlags;
use automation::{NotesAutomation, OsaScript};
use config::Config;
use edit::{EditOutcome, EditSession};
pub use error::{NotesError, Result};
use formatting::{FormatContext, TimeFormatter};
use note::{DEFAULT_FOLDER, Note, now_fixed};
use operations::{filter_by_folder, resolve_note, sort_notes, take_limit, target_for};
use shared::table::{Column, render_table, terminal_width};
use store::{NoteStore, SqliteStore};

pub fn entry() -> Result<()> {
    logging::init_logging();

    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        print_help();
        return Ok(());
    }

    let cmd = args.remove(0);
    if matches!(cmd.as_str(), "help" | "-h" | "--help") {
        print_help();
        return Ok(());
    }
    let config = Config::from_env()?;

    match cmd.as_str() {
        "list" | "ls" => list_notes(args, &config)?,
        "show" | "view" => show_note(args, &config)?,
        "search" => search_notes(args, &config)?,
        "folders" => list_folders(args, &config)?,
        "accounts" => list_accounts(args, &config)?,
        "export" => export_note(args, &config)?,
        "create" | "new" => create_note(args, &config)?,
        "append" => append_note(args, &config)?,
        "edit" => edit_note(args, &config)?,
        "delete" | "rm" => delete_note(args, &config)?,
        "new-folder" => new_folder(args, &config)?,
        "path" => println!("{}", config.db_path.display()),
        other => {
            return Err(NotesError::usage(format!(
                "Unknown command: {other}\nRun `notes help` for usage"
            )));
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        "\
Apple Notes CLI
Usage:
  notes list [-f|--folder <name>] [--sort modified|created|title] [--asc] [--limit N]
             [--relative] [--plain]
                                  List notes (default: most recently modified first)
  notes show <id|title> [--raw] [--plain]
                                  Show a note's text (--raw prints the unfiltered search text)
  notes search <query> [--title-only] [-f|--folder <name>] [--relative] [--plain]
                                  Find notes whose title or text contains <query>
  notes folders                   List folders with their account
  notes accounts                  List accounts
  notes export <id|title> [--html|--render|--plain]
                                  Print the live note body as markdown (or HTML / rendered / plain text)
  notes create <title> [body...] [-f|--folder <name>] [-a|--account <name>] [--stdin]
                                  Create a note; markdown body from args or stdin
  notes append <id|title> <text...>
                                  Append markdown text to a note
  notes edit <id|title> [--force] Edit a note as markdown in $VISUAL/$EDITOR
  notes delete <id|title> [-y|--yes]
                                  Delete a note (asks first unless --yes)
  notes new-folder <name> [-a|--account <name>]
                                  Create a folder
  notes path                      Show the database path
  notes help                      Show this message

A numeric <id|title> is looked up as an id first, then as a title.
Arguments after `--` are never read as flags, e.g. notes create Todo -- -x marks the spot

Environment:
  NOTES_DB_PATH                   Override the NoteStore.sqlite path
  NOTES_OSASCRIPT                 Override the osascript program
  NOTES_LOG                       Log filter, e.g. debug (logs go to stderr)
  NO_COLOR                        Disable colored output
"
    );
}

fn no_positional(flags: &CommonFlags, command: &str) -> Result<()> {
    match flags.positional.first() {
        Some(extra) => Err(NotesError::usage(format!(
            "Unexpected argument for {command}: {extra}"
        ))),
        None => Ok(()),
    }
}

/// Note argument from all positionals, so unquoted titles with spaces work.
fn note_argument(flags: &CommonFlags, usage: &str) -> Result<String> {
    flags.require_positional(usage)?;
    Ok(flags.positional.join(" "))
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.db_path)
}

fn list_notes(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(
        args,
        "list",
        &["-f", "--folder", "--sort", "--asc", "--desc", "-n", "--limit", "--relative", "--plain"],
    )?;
    no_positional(&flags, "list")?;

    let store = open_store(config)?;
    let mut notes = filter_by_folder(store.list_notes()?, flags.folder.as_deref());
    sort_notes(&mut notes, flags.sort_field, flags.ascending);
    take_limit(&mut notes, flags.limit);

    if notes.is_empty() {
        match &flags.folder {
            Some(folder) => println!("No notes in folder \"{folder}\"."),
            None => println!("No notes found."),
        }
        return Ok(());
    }

    let ctx = FormatContext::new(config.use_color && !flags.plain);
    let times = TimeFormatter::new(flags.relative_time, now_fixed());
    println!("{}", note_table(&notes, &ctx, &times, None));
    Ok(())
}

fn note_table(
    notes: &[Note],
    ctx: &FormatContext,
    times: &TimeFormatter,
    query: Option<&str>,
) -> String {
    let modified_label = times.format_label("Modified");
    let headers = ["ID", "Title", modified_label.as_str(), "Folder"];
    let rows: Vec<Vec<String>> = notes
        .iter()
        .map(|n| {
            vec![
                n.id.to_string(),
                n.display_title().to_string(),
                times.format(n.modified),
                n.folder_name().to_string(),
            ]
        })
        .collect();
    render_table(
        &headers,
        &[Column::Fit, Column::Flex, Column::Fit, Column::Fit],
        &rows,
        terminal_width(),
        |col, cell| match col {
            0 => ctx.format_id(cell),
            1 => ctx.highlight_match(cell, query),
            2 => ctx.format_timestamp(cell),
            _ => ctx.format_folder(cell),
        },
    )
}

fn show_note(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(args, "show", &["--raw", "--plain"])?;
    let arg = note_argument(&flags, "notes show <id|title> [--raw] [--plain]")?;

    let store = open_store(config)?;
    let note = resolve_note(&store, &arg)?;
    let ctx = FormatContext::new(config.use_color && !flags.plain);
    let times = TimeFormatter::new(false, now_fixed());

    let text = if flags.raw { note.search_text() } else { note.display_text() };
    println!(
        "{} ({})\nFolder: {}\nCreated: {}\nModified: {}\n",
        ctx.format_header(&format!("# {}", note.display_title())),
        ctx.format_id(&note.id.to_string()),
        ctx.format_folder(note.folder_name()),
        ctx.format_timestamp(&times.format(note.created)),
        ctx.format_timestamp(&times.format(note.modified)),
    );
    if text.is_empty() {
        println!("(no text content)");
    } else {
        println!("{text}");
    }
    Ok(())
}

fn search_notes(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(
        args,
        "search",
        &["--title-only", "-f", "--folder", "--relative", "--plain"],
    )?;
    let query = note_argument(&flags, "notes search <query> [--title-only] [-f <folder>]")?;

    let store = open_store(config)?;
    let notes = filter_by_folder(store.search(&query, flags.title_only)?, flags.folder.as_deref());
    if notes.is_empty() {
        println!("No notes match \"{query}\".");
        return Ok(());
    }

    let ctx = FormatContext::new(config.use_color && !flags.plain);
    let times = TimeFormatter::new(flags.relative_time, now_fixed());
    println!("{}", note_table(&notes, &ctx, &times, Some(query.as_str())));
    println!("\n{} match{}", notes.len(), if notes.len() == 1 { "" } else { "es" });
    Ok(())
}

fn list_folders(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(args, "folders", &["--plain"])?;
    no_positional(&flags, "folders")?;

    let store = open_store(config)?;
    let folders = store.folders()?;
    if folders.is_empty() {
        println!("No folders found.");
        return Ok(());
    }

    let ctx = FormatContext::new(config.use_color && !flags.plain);
    let rows: Vec<Vec<String>> = folders
        .iter()
        .map(|f| {
            vec![
                f.id.to_string(),
                f.title.clone(),
                f.account.clone().unwrap_or_default(),
            ]
        })
        .collect();
    let table = render_table(
        &["ID", "Folder", "Account"],
        &[Column::Fit, Column::Flex, Column::Fit],
        &rows,
        terminal_width(),
        |col, cell| match col {
            0 => ctx.format_id(cell),
            1 => ctx.format_folder(cell),
            _ => cell.to_string(),
        },
    );
    println!("{table}");
    Ok(())
}

fn list_accounts(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(args, "accounts", &[])?;
    no_positional(&flags, "accounts")?;

    let store = open_store(config)?;
    let accounts = store.accounts()?;
    if accounts.is_empty() {
        println!("No accounts found.");
        return Ok(());
    }
    for account in accounts {
        println!("{}", account.name);
    }
    Ok(())
}

fn automation(config: &Config) -> OsaScript {
    OsaScript::new(&config.osascript)
}

fn export_note(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(args, "export", &["--html", "--render", "-r", "--plain"])?;
    let arg = note_argument(&flags, "notes export <id|title> [--html|--render|--plain]")?;
    if [flags.html, flags.render, flags.plain].iter().filter(|f| **f).count() > 1 {
        return Err(NotesError::usage("Use only one of --html, --render and --plain"));
    }

    let store = open_store(config)?;
    let note = resolve_note(&store, &arg)?;
    let html = automation(config).body(&target_for(&note))?;

    if flags.html {
        println!("{html}");
    } else if flags.plain {
        println!("{}", markup::html_to_plaintext(&html));
    } else {
        let md = markup::decode(&html);
        if flags.render {
            println!("{}", render::render_markdown(&md, config.use_color));
        } else {
            println!("{md}");
        }
    }
    Ok(())
}

fn create_note(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(
        args,
        "create",
        &["-f", "--folder", "-a", "--account", "--stdin"],
    )?;
    let mut positional = flags.positional.iter();
    let title = positional
        .next()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| NotesError::usage("Usage: notes create <title> [body...]"))?;
    let mut body = positional.cloned().collect::<Vec<_>>().join(" ");
    if flags.stdin {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(input.trim_end());
    }

    let folder = flags.folder.as_deref().unwrap_or(DEFAULT_FOLDER);
    let html = markup::encode(&body);
    let id = automation(config).create(&title, &html, folder, flags.account.as_deref())?;
    tracing::debug!(%id, "created note");
    println!("Created note \"{title}\" in {folder}");
    Ok(())
}

fn append_note(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(args, "append", &[])?;
    let usage = "Usage: notes append <id|title> <text...>";
    let (arg, text) = match flags.positional.split_first() {
        Some((arg, rest)) if !rest.is_empty() => (arg, rest.join(" ")),
        _ => return Err(NotesError::usage(usage)),
    };

    let store = open_store(config)?;
    let note = resolve_note(&store, arg)?;
    automation(config).append_body(&target_for(&note), &markup::encode(&text))?;
    println!("Appended to \"{}\"", note.display_title());
    Ok(())
}

fn edit_note(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(args, "edit", &["--force"])?;
    let arg = note_argument(&flags, "notes edit <id|title> [--force]")?;

    let store = open_store(config)?;
    let note = resolve_note(&store, &arg)?;
    let title = note.display_title().to_string();
    let osa = automation(config);
    let session = EditSession::begin(&osa, target_for(&note), &title)?;

    let (buffer, edited) = edit_in_editor(&config.editor, session.markup())?;
    let force = flags.force;
    let committed = session.commit(&edited, |title| {
        force
            || confirm(&format!(
                "\"{title}\" was changed in Notes while you were editing. Overwrite?"
            ))
    });
    let outcome = match committed {
        Err(NotesError::EditConflict { title, .. }) => {
            let saved = match buffer.into_temp_path().keep() {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::warn!(error = %err, "could not keep edit buffer");
                    None
                }
            };
            return Err(NotesError::EditConflict { title, saved });
        }
        other => other?,
    };

    match outcome {
        EditOutcome::Unchanged => println!("No changes to \"{title}\""),
        EditOutcome::Updated => println!("Updated \"{title}\""),
    }
    Ok(())
}

/// Open `initial` in the user's editor and return the buffer file with the
/// saved text. The file is removed when the buffer is dropped.
fn edit_in_editor(editor: &str, initial: &str) -> Result<(NamedTempFile, String)> {
    let file = tempfile::Builder::new()
        .prefix("note-")
        .suffix(".md")
        .tempfile()?;
    fs::write(file.path(), initial)?;

    // EDITOR may carry arguments, e.g. "code --wait"
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi");
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        return Err(NotesError::Io(io::Error::other(format!(
            "Editor {program} exited with non-zero status"
        ))));
    }
    let edited = fs::read_to_string(file.path())?;
    Ok((file, edited))
}

/// Ask a yes/no question on stderr; anything but y/yes is a no.
fn confirm(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn delete_note(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(args, "delete", &["-y", "--yes"])?;
    let arg = note_argument(&flags, "notes delete <id|title> [-y|--yes]")?;

    let store = open_store(config)?;
    let note = resolve_note(&store, &arg)?;
    let title = note.display_title().to_string();
    if !flags.yes && !confirm(&format!("Delete \"{title}\" ({})?", note.id)) {
        println!("Nothing deleted.");
        return Ok(());
    }
    automation(config).delete(&target_for(&note))?;
    println!("Deleted \"{title}\"");
    Ok(())
}

fn new_folder(args: Vec<String>, config: &Config) -> Result<()> {
    let flags = CommonFlags::parse(args, "new-folder", &["-a", "--account"])?;
    let name = note_argument(&flags, "notes new-folder <name> [-a <account>]")?;
    automation(config).create_folder(&name, flags.account.as_deref())?;
    println!("Created folder \"{name}\"");
    Ok(())
}
