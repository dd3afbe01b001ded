//! Short binary name (`notes`) that forwards to the `notes_cli` library.

fn main() {
    if let Err(err) = notes_cli::entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
