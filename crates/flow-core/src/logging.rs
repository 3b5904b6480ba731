//! `log` backend shared by the Engine and Agent binaries.

use std::io::Write;

use log::LevelFilter;

/// Install `env_logger` for the process named `service`.
///
/// Starts from `info` (`debug` when asked) and then applies `RUST_LOG`
/// directives on top, so per-module overrides still work.
pub fn init_logging(service: &'static str, debug: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if debug { LevelFilter::Debug } else { LevelFilter::Info });
    if let Ok(directives) = std::env::var("RUST_LOG") {
        builder.parse_filters(&directives);
    }

    builder
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {} {} - {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                service,
                record.target(),
                record.args()
            )
        })
        .init();
}
