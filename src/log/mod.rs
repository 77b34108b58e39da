//! The `log` module configures where the simulation's log messages go. Logging is not to be
//! confused with _reporting_: the aggregate counts a model produces flow through
//! [`TimeSeriesRecorder`](crate::report::TimeSeriesRecorder)s, while log messages describe what
//! the simulation is doing.
//!
//! This module (re)exports the five logging macros: `error!`, `warn!`, `info!`, `debug!` and
//! `trace!`. The model logs aggregate counts at `info`, bookkeeping at `debug` and individual
//! agent transitions at `trace`.
//!
//! Logging is _disabled_ by default. It can be enabled with the runner's `--log-level <level>`
//! and `--log-filter <module=level>` options or from code:
//!
//! ```rust
//! use sird_grid::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! pub fn setup_logging() {
//!     // Per-tick counts
//!     set_log_level(LevelFilter::Info);
//!     // Every infection, death and recovery, but not every move
//!     set_module_filter("sird_grid::agent", LevelFilter::Trace);
//! }
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

pub use log::{debug, error, info, trace, warn, LevelFilter};

use crate::hashing::HashMap;

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// The process-wide filter state. Loggers are global, so there is exactly one of these and the
/// free functions below lock it.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Applies to every module without its own entry in `module_levels`
    pub(in crate::log) global_level: LevelFilter,
    /// Module path (e.g. `"sird_grid::model"`) to its maximum level
    pub(in crate::log) module_levels: HashMap<String, LevelFilter>,

    #[cfg(feature = "logging")]
    handle: Option<log4rs::Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_level: LevelFilter::Off,
            module_levels: HashMap::default(),
            #[cfg(feature = "logging")]
            handle: None,
        }
    }
}

impl LogConfiguration {
    fn set_global_level(&mut self, level: LevelFilter) {
        self.global_level = level;
        self.apply();
    }

    fn set_module_levels(&mut self, filters: &[(&str, LevelFilter)]) {
        let mut changed = false;
        for &(module, level) in filters {
            changed |= self.module_levels.insert(module.to_string(), level) != Some(level);
        }
        if changed {
            self.apply();
        }
    }
}

/// Sets the level for every module without a filter of its own. `LevelFilter::Off` disables
/// logging.
pub fn set_log_level(level: LevelFilter) {
    configuration().set_global_level(level);
}

/// Sets the maximum level for one module path and everything below it.
pub fn set_module_filter(module_path: &str, level: LevelFilter) {
    configuration().set_module_levels(&[(module_path, level)]);
}

/// Like [`set_module_filter`] for several modules, reconfiguring the logger once.
pub fn set_module_filters(filters: &[(&str, LevelFilter)]) {
    configuration().set_module_levels(filters);
}

fn configuration() -> MutexGuard<'static, LogConfiguration> {
    // The configuration stays usable even if a panicking thread held the lock
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
