//! Stands in for the console logger when the `logging` feature is off. Nothing is written
//! anywhere, but the level bookkeeping still applies.

use log::LevelFilter;

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn apply(&mut self) {
        let loudest = self
            .module_levels
            .values()
            .copied()
            .fold(self.global_level, LevelFilter::max);
        log::set_max_level(loudest);
    }
}
