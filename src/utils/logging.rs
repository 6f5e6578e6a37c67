use tracing::Level;

/// Resolves a configured level name. Unknown names fall back to `info`.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_ascii_lowercase().as_str() {
        "warning" => Level::WARN,
        other => other.parse().unwrap_or(Level::INFO),
    }
}

/// Installs the global `fmt` subscriber at `level` and returns the level used.
///
/// A second call keeps the first subscriber, so tests may call this freely.
pub fn init(level: &str) -> Level {
    let level = parse_level(level);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
    level
}
