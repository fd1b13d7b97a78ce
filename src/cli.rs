use barycenter::config::{available_workers, Config, SkipPolicy, Strategy};
use barycenter::constants::{DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY};
use barycenter::reduction::{ReduceMode, ReduceOptions, ZeroMassPolicy};
use clap::Parser;
use std::path::PathBuf;

/// Computes the barycenter (center of mass) of every x:y:z:mass point in a file.
#[derive(Debug, Parser)]
#[command(name = "barycenter", version)]
pub struct Cli {
    /// File with one x:y:z:mass record per line; other lines are skipped
    pub file: PathBuf,

    /// How lines are read and parsed
    #[arg(short, long, value_enum, default_value_t = Strategy::Threaded)]
    pub strategy: Strategy,

    /// Fail on the first malformed line instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Report NaN instead of failing when two masses sum to zero
    #[arg(long)]
    pub allow_nan: bool,

    /// Spread the combines of each reduction round over all cores
    #[arg(long)]
    pub parallel_reduce: bool,

    /// Worker threads used for loading [default: all cores]
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Capacity of the channel between parsing workers and the collector
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Lines handed to a worker thread at once (threaded strategy)
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Print the result as a single JSON object
    #[arg(long)]
    pub json: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            strategy: self.strategy,
            workers: self.workers.unwrap_or_else(available_workers),
            channel_capacity: self.channel_capacity,
            batch_size: self.batch_size,
            skip_policy: if self.strict {
                SkipPolicy::Strict
            } else {
                SkipPolicy::Silent
            },
            reduce: ReduceOptions {
                mode: if self.parallel_reduce {
                    ReduceMode::Parallel
                } else {
                    ReduceMode::Sequential
                },
                zero_mass: if self.allow_nan {
                    ZeroMassPolicy::Propagate
                } else {
                    ZeroMassPolicy::Reject
                },
            },
        }
        .sanitized()
    }
}

#[test]
fn test_single_positional_argument_gives_default_config() {
    let cli = Cli::try_parse_from(["barycenter", "points.txt"]).unwrap();
    assert_eq!(cli.file, PathBuf::from("points.txt"));
    assert!(!cli.json);
    assert_eq!(cli.config(), Config::default());
}

#[test]
fn test_flags_map_onto_config() {
    let cli = Cli::try_parse_from([
        "barycenter",
        "--strategy",
        "async",
        "--strict",
        "--allow-nan",
        "--parallel-reduce",
        "--workers",
        "3",
        "--channel-capacity",
        "0",
        "points.txt",
    ])
    .unwrap();
    let config = cli.config();
    assert_eq!(config.strategy, Strategy::Async);
    assert_eq!(config.skip_policy, SkipPolicy::Strict);
    assert_eq!(config.reduce.mode, ReduceMode::Parallel);
    assert_eq!(config.reduce.zero_mass, ZeroMassPolicy::Propagate);
    assert_eq!(config.workers, 3);
    assert_eq!(config.channel_capacity, 1);
}

#[test]
fn test_wrong_argument_count_is_rejected() {
    assert!(Cli::try_parse_from(["barycenter"]).is_err());
    assert!(Cli::try_parse_from(["barycenter", "a.txt", "b.txt"]).is_err());
}
