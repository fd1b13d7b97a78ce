/// Number of colon-separated fields on every input line: x, y, z and mass.
pub const FIELDS_PER_LINE: usize = 4;

/// Separator between the fields of an input line.
pub const FIELD_SEPARATOR: char = ':';

/// Capacity of the hand-off channel between parsing workers and the collector.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Number of lines handed to one worker thread at a time.
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// Futures kept in flight per worker by the async loader.
pub const ASYNC_BUFFER_PER_WORKER: usize = 5;

/// Sleep between polls while waiting on a free worker, in milliseconds.
pub const SEMI_SPINLOCK_MILLIS: u64 = 1;
