fn main() {
    if let Err(error) = review_notes_lib::run() {
        eprintln!("error: {:#}", error);
        std::process::exit(1);
    }
}
