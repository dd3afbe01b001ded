fn main() {
    if let Err(err) = notes_cli::entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
