fn main() {
    if let Err(error) = treepull_cli::run() {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}
