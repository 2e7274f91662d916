use std::io::Write;

/// Installs `env_logger`, honoring `-v`/`-q` on top of `RUST_LOG`.
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

/// Opens a session against the receiver, reporting the sticky session
/// error (if any survived the open sequence) as the anyhow error.
pub fn open_session() -> anyhow::Result<g4lib::Session> {
    g4lib::Session::open().map_err(anyhow::Error::from)
}
