//! venvpool-compact binary: compaction only, for cron jobs and timers.
//! Takes no arguments; the pool location comes from $VENVPOOL_DIR or the default.

fn main() {
    match venvpool::run_compact() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(venvpool::error_exit_code(&e));
        }
    }
}
