pub mod address;
pub mod block;
pub mod config;
pub mod export;
pub mod rpc;

use log::LevelFilter;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

pub fn set_up_logging(level: LevelFilter, file: Option<&Path>) -> anyhow::Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(io::stdout());
    if let Some(file) = file {
        dispatch = dispatch.chain(fern::log_file(file)?);
    }
    dispatch.apply()?;
    Ok(())
}

/// Runs a logging closure at most once per interval. The first call always logs.
pub struct IntervalLogger {
    interval: Duration,
    last: Option<Instant>,
}

impl Default for IntervalLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalLogger {
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(5))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn log<F: FnOnce()>(&mut self, f: F) {
        if self.last.is_some_and(|x| x.elapsed() < self.interval) {
            return;
        }
        f();
        self.last = Some(Instant::now());
    }
}
