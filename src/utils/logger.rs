use std::io::Write;

use chrono::Utc;
use log::LevelFilter;

/// Sets up `env_logger` with the project line format:
/// `[2024-05-01 10:15:00 UTC] [INFO] [src/main.rs:12] message`.
///
/// `level` is an env_logger filter string (`info`, `palaver=debug,warn`, ...).
/// `RUST_LOG`, when set, still wins.
pub fn init(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_filters(level);
    if let Ok(from_env) = std::env::var("RUST_LOG") {
        builder.parse_filters(&from_env);
    }
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] [{}:{}] {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    // a second init (tests, embedding) keeps the first logger
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
