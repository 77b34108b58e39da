//! Console output through `log4rs`.

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::log::LogConfiguration;

const APPENDER: &str = "stderr";

// ISO 8601 timestamp, highlighted level, module path
const PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

impl LogConfiguration {
    /// Builds the `log4rs` config matching the current levels. Messages go to stderr; stdout
    /// carries the CSV report.
    fn to_config(&self) -> Config {
        let console = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build();

        let mut modules: Vec<_> = self.module_levels.iter().collect();
        modules.sort_unstable();
        let loggers = modules
            .into_iter()
            .map(|(module, &level)| Logger::builder().build(module.as_str(), level));

        Config::builder()
            .appender(Appender::builder().build(APPENDER, Box::new(console)))
            .loggers(loggers)
            .build(Root::builder().appender(APPENDER).build(self.global_level))
            // Logger names are unique map keys and the only appender is registered above
            .unwrap_or_else(|errors| panic!("invalid log4rs config: {errors}"))
    }

    /// Installs the global logger on first use and reconfigures it afterwards.
    pub(in crate::log) fn apply(&mut self) {
        let config = self.to_config();
        if let Some(handle) = &self.handle {
            handle.set_config(config);
            return;
        }
        match log4rs::init_config(config) {
            Ok(handle) => self.handle = Some(handle),
            // Some other logger owns the process; only the max level is ours to set
            Err(_) => log::set_max_level(self.global_level),
        }
    }
}
