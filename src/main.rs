fn main() {
    let code = positional::cli::run();
    std::process::exit(code);
}
