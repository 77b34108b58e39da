use std::io;
use std::path::PathBuf;

use clap::{Args, Command, FromArgMatches as _};
use log::info;

use crate::config::SimulationConfig;
use crate::error::SirdError;
use crate::log::{set_log_level, set_module_filters, LevelFilter};
use crate::model::Model;
use crate::report::CsvReport;

/// Default cli arguments for the sird-grid runner
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// Random seed; overrides the seed in the config file
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path for a JSON simulation config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stop after this many ticks even if agents are still infected
    #[arg(short, long)]
    pub max_ticks: Option<u64>,

    /// Enable logging at this level (error, warn, info, debug, trace)
    #[arg(short, long)]
    pub log_level: Option<LevelFilter>,

    /// Per-module log level, e.g. `sird_grid::agent=trace`; may be repeated
    #[arg(long = "log-filter", value_name = "MODULE=LEVEL", value_parser = parse_module_filter)]
    pub log_filters: Vec<(String, LevelFilter)>,

    /// Don't write the tick-by-tick counts to stdout as CSV
    #[arg(long)]
    pub no_csv: bool,
}

fn parse_module_filter(arg: &str) -> Result<(String, LevelFilter), String> {
    let (module, level) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE=LEVEL, got `{arg}`"))?;
    if module.is_empty() {
        return Err(format!("missing module path in `{arg}`"));
    }
    let level = level
        .parse()
        .map_err(|_| format!("unknown log level `{level}`"))?;
    Ok((module.to_string(), level))
}

fn create_cli() -> Command {
    let cli = Command::new("sird-grid")
        .about("Agent-based SIR-with-death epidemic on a 2-D grid");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation configured from the command line.
///
/// `setup_fn` is called with the freshly built model before the first step, e.g. to attach
/// extra recorders.
///
/// # Errors
/// Returns an error if argument parsing, configuration or any step fails
pub fn run_with_args<F>(setup_fn: F) -> Result<Model, Box<dyn std::error::Error>>
where
    F: FnOnce(&mut Model, &BaseArgs) -> Result<(), SirdError>,
{
    let matches = create_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    Ok(run_with_args_internal(&args, setup_fn)?)
}

/// Resolves the configuration: the file if one was given, otherwise the defaults, with the
/// seed and tick limit overridden from the command line.
fn resolve_config(args: &BaseArgs) -> Result<SimulationConfig, SirdError> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.random_seed {
        config.seed = seed;
    }
    if let Some(max_ticks) = args.max_ticks {
        config.max_ticks = Some(max_ticks);
    }
    Ok(config)
}

fn run_with_args_internal<F>(args: &BaseArgs, setup_fn: F) -> Result<Model, SirdError>
where
    F: FnOnce(&mut Model, &BaseArgs) -> Result<(), SirdError>,
{
    if let Some(level) = args.log_level {
        set_log_level(level);
    }
    if !args.log_filters.is_empty() {
        let filters: Vec<(&str, LevelFilter)> = args
            .log_filters
            .iter()
            .map(|(module, level)| (module.as_str(), *level))
            .collect();
        set_module_filters(&filters);
    }

    let config = resolve_config(args)?;
    let mut model = Model::from_config(config)?;
    if !args.no_csv {
        model.add_recorder(Box::new(CsvReport::new(io::stdout())));
    }

    setup_fn(&mut model, args)?;

    model.run()?;
    let counts = model.counts();
    info!(
        "final counts at tick {}: susceptible {} infected {} recovered {} dead {}",
        model.tick(),
        counts.susceptible,
        counts.infected,
        counts.recovered,
        counts.dead
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::HealthStatus;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn cli_definition_is_valid() {
        create_cli().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let matches = create_cli().get_matches_from([
            "sird-grid",
            "--random-seed",
            "42",
            "--max-ticks",
            "10",
            "--log-level",
            "debug",
            "--log-filter",
            "sird_grid::agent=trace",
            "--log-filter",
            "sird_grid::scheduler=off",
            "--no-csv",
        ]);
        let args = BaseArgs::from_arg_matches(&matches).unwrap();
        assert_eq!(args.random_seed, Some(42));
        assert_eq!(args.max_ticks, Some(10));
        assert_eq!(args.log_level, Some(LevelFilter::Debug));
        assert_eq!(
            args.log_filters,
            vec![
                ("sird_grid::agent".to_string(), LevelFilter::Trace),
                ("sird_grid::scheduler".to_string(), LevelFilter::Off),
            ]
        );
        assert!(args.no_csv);
        assert_eq!(args.config, None);
    }

    #[test]
    fn malformed_log_filters_are_rejected() {
        for bad in ["sird_grid::agent", "=debug", "sird_grid::agent=loud"] {
            let result = create_cli().try_get_matches_from(["sird-grid", "--log-filter", bad]);
            assert!(result.is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn flags_override_config_file() {
        let file = config_file(r#"{"population": 20, "width": 5, "height": 5, "seed": 1}"#);
        let args = BaseArgs {
            random_seed: Some(42),
            config: Some(file.path().to_path_buf()),
            max_ticks: Some(3),
            ..BaseArgs::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.population, 20);
        assert_eq!(config.seed, 42);
        assert_eq!(config.max_ticks, Some(3));
    }

    #[test]
    fn run_with_config_path() {
        let file = config_file(
            r#"{"population": 30, "width": 6, "height": 6, "max_infection_time": 3, "max_ticks": 50}"#,
        );
        let args = BaseArgs {
            config: Some(file.path().to_path_buf()),
            no_csv: true,
            ..BaseArgs::default()
        };
        let mut setup_called = false;
        let model = run_with_args_internal(&args, |model, _| {
            setup_called = true;
            assert_eq!(model.tick(), 0);
            Ok(())
        })
        .unwrap();
        assert!(setup_called);
        assert!(!model.is_running());
        assert_eq!(model.counts().total(), 30);
    }

    #[test]
    fn invalid_config_fails() {
        let file = config_file(r#"{"infection_rate": 3.0}"#);
        let args = BaseArgs {
            config: Some(file.path().to_path_buf()),
            no_csv: true,
            ..BaseArgs::default()
        };
        let result = run_with_args_internal(&args, |_, _| Ok(()));
        assert!(matches!(result, Err(SirdError::InvalidConfiguration(_))));
    }

    #[test]
    fn setup_error_aborts_run() {
        let file = config_file(r#"{"population": 5, "width": 3, "height": 3}"#);
        let args = BaseArgs {
            config: Some(file.path().to_path_buf()),
            no_csv: true,
            ..BaseArgs::default()
        };
        let result = run_with_args_internal(&args, |_, _| {
            Err(SirdError::InconsistentAgentState("setup".to_string()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn same_seed_same_outcome() {
        let file = config_file(
            r#"{"population": 40, "width": 6, "height": 6, "max_ticks": 25, "seed": 3}"#,
        );
        let args = BaseArgs {
            config: Some(file.path().to_path_buf()),
            no_csv: true,
            ..BaseArgs::default()
        };
        let a = run_with_args_internal(&args, |_, _| Ok(())).unwrap();
        let b = run_with_args_internal(&args, |_, _| Ok(())).unwrap();
        assert_eq!(a.time_series().rows(), b.time_series().rows());
        assert_eq!(
            a.time_series().series(HealthStatus::Dead),
            b.time_series().series(HealthStatus::Dead)
        );
    }
}
