pub mod compact;
pub mod env;
pub mod run;

/// Conventional status for a run cut short by SIGINT (128 + 2).
pub const EXIT_INTERRUPTED: i32 = 130;
