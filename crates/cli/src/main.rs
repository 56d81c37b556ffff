fn main() {
    if let Err(e) = tagscope_cli::run() {
        eprintln!("tagscope: {}", e);
        std::process::exit(1);
    }
}
