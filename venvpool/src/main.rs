fn main() {
    match venvpool::run_cli() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(venvpool::error_exit_code(&e));
        }
    }
}
