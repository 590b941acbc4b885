use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Initialize the launcher's logger. `-v` forces debug; otherwise the
/// filter comes from RUST_LOG, then `default_filter`.
pub fn init_logger(verbose: bool, default_filter: &str) {
    let env = Env::default().filter_or("RUST_LOG", default_filter);

    let mut builder = Builder::from_env(env);
    builder.format(|buf, record| {
        writeln!(buf, "{:<5} {}", record.level(), record.args())
    });
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}
