fn main() {
    if let Err(err) = xlabel::run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
