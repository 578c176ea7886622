//! `log` as the facade, `log4rs` as the backend the teacher wires in
//! (`src/logger.rs`). The store itself only ever calls
//! `log::{debug,info,warn,error}` at I/O boundaries and worker-state
//! transitions; it never calls `log4rs::init*` on its own. These helpers
//! exist for binaries/tests that want a rolling file appender and are
//! opt-in only.

use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

/// Initialize logging from `log4rs.yaml` in the current directory, if present.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file("log4rs.yaml", Default::default())?;
    Ok(())
}

/// Initialize logging to `{base}/{store_name}_logs/{store_name}.log`.
pub fn init_for_store_in(base: &Path, store_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = base.join(format!("{store_name}_logs"));
    std::fs::create_dir_all(&log_dir)?;
    let logfile = log_dir.join(format!("{store_name}.log"));
    let encoder = Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}"));
    let file_appender = FileAppender::builder().encoder(encoder).build(logfile)?;
    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .build(Root::builder().appender("file").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}
