/// Initialize env_logger for the CLI. Defaults to info level; override
/// with RUST_LOG.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
}
