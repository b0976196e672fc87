use log::LevelFilter;

/// Initialize logging using env_logger at `info`.
/// `RUST_LOG` overrides the default, e.g. `RUST_LOG=keepalive_core=debug keepalive run`.
pub fn init_logging() {
    init_logging_with(LevelFilter::Info);
}

/// Like [`init_logging`] with a different default level. Calling it twice is harmless.
pub fn init_logging_with(default_level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .try_init();
}
