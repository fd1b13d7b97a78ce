use crate::constants::*;
use crate::reduction::{ReduceMode, ReduceOptions, ZeroMassPolicy};

/// How the loader turns lines into points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    /// Read and parse on the calling thread.
    Sequential,
    /// Batches of lines parsed on worker threads, fanned into a bounded channel.
    #[default]
    Threaded,
    /// One tokio task per line, joined through a buffered stream.
    Async,
}

/// What the loader does with a line that isn't an `x:y:z:mass` record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Drop the line and keep count.
    #[default]
    Silent,
    /// Abort on the first malformed line.
    Strict,
}

/// Everything a run needs to know. `Config::default()` behaves like the
/// plain command line: threaded loading, silent skipping, sequential
/// reduction that refuses degenerate masses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub strategy: Strategy,
    pub workers: usize,
    pub channel_capacity: usize,
    pub batch_size: usize,
    pub skip_policy: SkipPolicy,
    pub reduce: ReduceOptions,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            strategy: Strategy::default(),
            workers: available_workers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            skip_policy: SkipPolicy::default(),
            reduce: ReduceOptions::default(),
        }
    }
}

impl Config {
    /// Same as the default config but with a different loading strategy.
    pub fn with_strategy(strategy: Strategy) -> Self {
        Config {
            strategy,
            ..Config::default()
        }
    }

    pub fn strict(mut self) -> Self {
        self.skip_policy = SkipPolicy::Strict;
        self
    }

    pub fn parallel_reduce(mut self) -> Self {
        self.reduce.mode = ReduceMode::Parallel;
        self
    }

    pub fn allow_nan(mut self) -> Self {
        self.reduce.zero_mass = ZeroMassPolicy::Propagate;
        self
    }

    /// Clamps the numeric knobs to at least one so no loader can be
    /// configured into a deadlock.
    pub fn sanitized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.channel_capacity = self.channel_capacity.max(1);
        self.batch_size = self.batch_size.max(1);
        self
    }
}

/// Number of threads this machine can run in parallel, or 1 if unknown.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[test]
fn test_default_config_matches_plain_run() {
    let config = Config::default();
    assert_eq!(config.strategy, Strategy::Threaded);
    assert_eq!(config.skip_policy, SkipPolicy::Silent);
    assert_eq!(config.channel_capacity, 128);
    assert_eq!(config.reduce.mode, ReduceMode::Sequential);
    assert_eq!(config.reduce.zero_mass, ZeroMassPolicy::Reject);
    assert!(config.workers >= 1);
}

#[test]
fn test_sanitized_clamps_zeroes() {
    let config = Config {
        workers: 0,
        channel_capacity: 0,
        batch_size: 0,
        ..Config::default()
    }
    .sanitized();
    assert_eq!(config.workers, 1);
    assert_eq!(config.channel_capacity, 1);
    assert_eq!(config.batch_size, 1);
}

#[test]
fn test_builder_flags() {
    let config = Config::with_strategy(Strategy::Async)
        .strict()
        .parallel_reduce()
        .allow_nan();
    assert_eq!(config.strategy, Strategy::Async);
    assert_eq!(config.skip_policy, SkipPolicy::Strict);
    assert_eq!(config.reduce.mode, ReduceMode::Parallel);
    assert_eq!(config.reduce.zero_mass, ZeroMassPolicy::Propagate);
}
