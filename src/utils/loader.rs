//! Loads a text source of `x:y:z:mass` records into a collection of points.
//!
//! Three strategies share the same contract: every line either contributes
//! one point or is dropped, the arrival order of the points is unspecified,
//! and ending up with zero points is an error.
use crate::{
    config::{Config, SkipPolicy, Strategy},
    constants::ASYNC_BUFFER_PER_WORKER,
    error::{Error, Result},
    mass_point::MassPoint,
    utils::{async_balancer, balancer::Balancer},
};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use futures::{Stream, StreamExt};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// One raw input line and its 1-based position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub text: String,
}

impl Line {
    /// The point this line describes, or `None` if it is malformed.
    pub fn parse(&self) -> Option<MassPoint> {
        self.text.parse().ok()
    }
}

/// Iterator over the lines of a reader, terminators included. Bytes that are
/// not valid UTF-8 are replaced instead of failing the read, so such lines
/// simply don't parse.
pub struct Lines<R> {
    reader: R,
    number: usize,
    buffer: Vec<u8>,
}

impl<R: BufRead> Lines<R> {
    pub fn new(reader: R) -> Self {
        Lines {
            reader,
            number: 0,
            buffer: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = std::io::Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                self.number += 1;
                Some(Ok(Line {
                    number: self.number,
                    text: String::from_utf8_lossy(&self.buffer).into_owned(),
                }))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// The loaded points plus what it took to get them.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub points: Vec<MassPoint>,
    pub lines_read: usize,
    pub lines_skipped: usize,
    pub elapsed: Duration,
}

/// A way of turning a line source into a [`LoadReport`].
pub trait Ingest {
    fn ingest<R: BufRead>(&self, reader: R) -> Result<LoadReport>;
}

/// Line accounting shared by every strategy. Keeps the earliest malformed
/// line so strict mode reports the same line whatever the interleaving.
#[derive(Debug, Default)]
struct Tally {
    lines_read: usize,
    lines_skipped: usize,
    first_malformed: Option<Line>,
}

impl Tally {
    fn record(&mut self, line: &Line, point: Option<MassPoint>) -> Option<MassPoint> {
        self.lines_read += 1;
        if point.is_none() {
            self.lines_skipped += 1;
            let earlier = self
                .first_malformed
                .as_ref()
                .map_or(true, |first| line.number < first.number);
            if earlier {
                self.first_malformed = Some(line.clone());
            }
        }
        point
    }

    fn merge(&mut self, other: Tally) {
        self.lines_read += other.lines_read;
        self.lines_skipped += other.lines_skipped;
        if let Some(line) = other.first_malformed {
            let earlier = self
                .first_malformed
                .as_ref()
                .map_or(true, |first| line.number < first.number);
            if earlier {
                self.first_malformed = Some(line);
            }
        }
    }

    fn finish(
        self,
        points: Vec<MassPoint>,
        skip_policy: SkipPolicy,
        start: Instant,
    ) -> Result<LoadReport> {
        if let (SkipPolicy::Strict, Some(line)) = (skip_policy, self.first_malformed) {
            return Err(Error::MalformedLine {
                line: line.number,
                content: line.text.trim_end_matches(&['\r', '\n'][..]).to_string(),
            });
        }

        if self.lines_skipped > 0 {
            log::info!(
                "skipped {} malformed lines out of {}",
                self.lines_skipped,
                self.lines_read
            );
        }

        if points.is_empty() {
            return Err(Error::InsufficientData);
        }

        let elapsed = start.elapsed();
        log::info!(
            "loaded {} points from {} lines in {elapsed:?}",
            points.len(),
            self.lines_read
        );

        Ok(LoadReport {
            points,
            lines_read: self.lines_read,
            lines_skipped: self.lines_skipped,
            elapsed,
        })
    }
}

/// Reads and parses on the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct SequentialLoader {
    pub skip_policy: SkipPolicy,
}

impl Ingest for SequentialLoader {
    fn ingest<R: BufRead>(&self, reader: R) -> Result<LoadReport> {
        let start = Instant::now();
        let mut tally = Tally::default();
        let mut points = Vec::new();

        for line in Lines::new(reader) {
            let line = line?;
            match tally.record(&line, line.parse()) {
                Some(point) => points.push(point),
                None if self.skip_policy == SkipPolicy::Strict => break,
                None => {}
            }
        }

        tally.finish(points, self.skip_policy, start)
    }
}

/// Reads on the calling thread and hands batches of lines to worker threads.
/// Workers push parsed points into a bounded channel drained by a single
/// collector thread, which stops once it receives the completion signal.
#[derive(Debug, Clone, Copy)]
pub struct ThreadedLoader {
    pub workers: usize,
    pub channel_capacity: usize,
    pub batch_size: usize,
    pub skip_policy: SkipPolicy,
}

impl Ingest for ThreadedLoader {
    fn ingest<R: BufRead>(&self, reader: R) -> Result<LoadReport> {
        let start = Instant::now();

        let (point_tx, point_rx) = bounded::<MassPoint>(self.channel_capacity.max(1));
        let (done_tx, done_rx) = bounded::<()>(1);
        let collector = thread::spawn(move || collect(point_rx, done_rx));

        let mut balancer: Balancer<Tally> = Balancer::new(self.workers);
        let dispatched = self.dispatch(reader, &mut balancer, &point_tx);

        // Workers and collector are joined even when reading failed part way.
        let tallies = balancer.wait();
        drop(point_tx);
        let _ = done_tx.send(());

        let points = collector
            .join()
            .map_err(|_| Error::Runtime(String::from("collector thread panicked")))?;
        dispatched?;
        let tallies = tallies?;

        let mut tally = Tally::default();
        for other in tallies {
            tally.merge(other);
        }
        tally.finish(points, self.skip_policy, start)
    }
}

impl ThreadedLoader {
    /// Reads `reader` into batches and hands each one to a worker.
    fn dispatch<R: BufRead>(
        &self,
        reader: R,
        balancer: &mut Balancer<Tally>,
        points: &Sender<MassPoint>,
    ) -> Result<()> {
        let batch_size = self.batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);
        for line in Lines::new(reader) {
            batch.push(line?);
            if batch.len() == batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                let tx = points.clone();
                balancer.spawn(move || parse_batch(full, tx))?;
            }
        }
        if !batch.is_empty() {
            let tx = points.clone();
            balancer.spawn(move || parse_batch(batch, tx))?;
        }
        Ok(())
    }
}

fn parse_batch(batch: Vec<Line>, points: Sender<MassPoint>) -> Tally {
    let mut tally = Tally::default();
    for line in &batch {
        if let Some(point) = tally.record(line, line.parse()) {
            // The collector only hangs up when the load is being abandoned
            if points.send(point).is_err() {
                break;
            }
        }
    }
    tally
}

/// Receives points until the completion signal arrives, then drains whatever
/// is still buffered.
fn collect(points: Receiver<MassPoint>, done: Receiver<()>) -> Vec<MassPoint> {
    let mut collected = Vec::new();
    loop {
        select! {
            recv(points) -> point => match point {
                Ok(point) => collected.push(point),
                Err(_) => break,
            },
            recv(done) -> _ => {
                collected.extend(points.try_iter());
                break;
            }
        }
    }
    collected
}

/// Spawns one tokio task per line and joins them through a buffered stream.
#[derive(Debug, Clone, Copy)]
pub struct AsyncLoader {
    pub workers: usize,
    pub skip_policy: SkipPolicy,
}

impl Ingest for AsyncLoader {
    fn ingest<R: BufRead>(&self, reader: R) -> Result<LoadReport> {
        let start = Instant::now();
        let balancer = async_balancer::Balancer::new(self.workers, ASYNC_BUFFER_PER_WORKER)?;

        let parsed = balancer
            .manager
            .spawn_buffered(Lines::new(reader), |line| async move {
                line.map(|line| {
                    let point = line.parse();
                    (line, point)
                })
            });

        balancer
            .runtime
            .block_on(gather(parsed, self.skip_policy, start))
    }
}

async fn gather<S>(parsed: S, skip_policy: SkipPolicy, start: Instant) -> Result<LoadReport>
where
    S: Stream<Item = Result<std::io::Result<(Line, Option<MassPoint>)>>>,
{
    futures::pin_mut!(parsed);

    let mut tally = Tally::default();
    let mut points = Vec::new();
    while let Some(outcome) = parsed.next().await {
        let (line, point) = outcome??;
        match tally.record(&line, point) {
            Some(point) => points.push(point),
            None if skip_policy == SkipPolicy::Strict => break,
            None => {}
        }
    }

    tally.finish(points, skip_policy, start)
}

impl From<&Config> for SequentialLoader {
    fn from(config: &Config) -> Self {
        SequentialLoader {
            skip_policy: config.skip_policy,
        }
    }
}

impl From<&Config> for ThreadedLoader {
    fn from(config: &Config) -> Self {
        ThreadedLoader {
            workers: config.workers,
            channel_capacity: config.channel_capacity,
            batch_size: config.batch_size,
            skip_policy: config.skip_policy,
        }
    }
}

impl From<&Config> for AsyncLoader {
    fn from(config: &Config) -> Self {
        AsyncLoader {
            workers: config.workers,
            skip_policy: config.skip_policy,
        }
    }
}

/// Loads every point from `reader` with the strategy picked in `config`.
pub fn ingest<R: BufRead>(reader: R, config: &Config) -> Result<LoadReport> {
    let config = config.clone().sanitized();
    log::debug!(
        "loading with {:?} strategy, {} workers",
        config.strategy,
        config.workers
    );

    match config.strategy {
        Strategy::Sequential => SequentialLoader::from(&config).ingest(reader),
        Strategy::Threaded => ThreadedLoader::from(&config).ingest(reader),
        Strategy::Async => AsyncLoader::from(&config).ingest(reader),
    }
}

/// Opens `path` and loads every point in it.
pub fn load_file(path: impl AsRef<Path>, config: &Config) -> Result<LoadReport> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("opened {}", path.display());

    ingest(BufReader::new(file), config)
}

#[cfg(test)]
const STRATEGIES: [Strategy; 3] = [Strategy::Sequential, Strategy::Threaded, Strategy::Async];

#[cfg(test)]
fn load_str(input: &str, config: &Config) -> Result<LoadReport> {
    ingest(std::io::Cursor::new(input.as_bytes().to_vec()), config)
}

#[cfg(test)]
fn sorted(mut points: Vec<MassPoint>) -> Vec<MassPoint> {
    points.sort_by(|a, b| a.x().total_cmp(&b.x()));
    points
}

#[test]
fn test_lines_numbers_and_keeps_terminators() {
    let lines: Vec<Line> = Lines::new(std::io::Cursor::new("a\nb\r\n\nlast"))
        .map(|line| line.unwrap())
        .collect();
    let texts: Vec<&str> = lines.iter().map(|line| line.text.as_str()).collect();
    assert_eq!(texts, vec!["a\n", "b\r\n", "\n", "last"]);
    assert_eq!(lines[3].number, 4);
}

#[test]
fn test_lines_replaces_invalid_utf8() {
    let bytes: &[u8] = b"1:2:3:4\n\xff\xfe:0:0:1\n";
    let lines: Vec<Line> = Lines::new(bytes).map(|line| line.unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].parse().is_some());
    assert!(lines[1].parse().is_none());
}

#[test]
fn test_skips_malformed_line_with_every_strategy() {
    for strategy in STRATEGIES {
        let report = load_str("1:2:3:4\ngarbage\n5:6:7:8\n", &Config::with_strategy(strategy)).unwrap();
        assert_eq!(
            sorted(report.points),
            vec![
                MassPoint::new(1.0, 2.0, 3.0, 4.0),
                MassPoint::new(5.0, 6.0, 7.0, 8.0)
            ],
            "{strategy:?}"
        );
        assert_eq!(report.lines_read, 3, "{strategy:?}");
        assert_eq!(report.lines_skipped, 1, "{strategy:?}");
    }
}

#[test]
fn test_last_line_without_newline_is_loaded() {
    for strategy in STRATEGIES {
        let report = load_str("0:0:0:1\n2:0:0:1", &Config::with_strategy(strategy)).unwrap();
        assert_eq!(report.points.len(), 2, "{strategy:?}");
    }
}

#[test]
fn test_empty_input_is_insufficient() {
    for strategy in STRATEGIES {
        let config = Config::with_strategy(strategy);
        assert!(
            matches!(load_str("", &config), Err(Error::InsufficientData)),
            "{strategy:?}"
        );
        assert!(
            matches!(load_str("nope\n\n1:2:3\n", &config), Err(Error::InsufficientData)),
            "{strategy:?}"
        );
    }
}

#[test]
fn test_strict_reports_first_malformed_line() {
    let input = "1:2:3:4\n5:6:7:8\nbad line\n9:9:9:9\nworse\n";
    for strategy in STRATEGIES {
        let config = Config {
            batch_size: 1,
            ..Config::with_strategy(strategy).strict()
        };
        match load_str(input, &config) {
            Err(Error::MalformedLine { line, content }) => {
                assert_eq!(line, 3, "{strategy:?}");
                assert_eq!(content, "bad line", "{strategy:?}");
            }
            other => panic!("{strategy:?}: expected a malformed line error, got {other:?}"),
        }
    }
}

#[test]
fn test_strict_accepts_clean_input() {
    for strategy in STRATEGIES {
        let config = Config::with_strategy(strategy).strict();
        let report = load_str("0:0:0:1\n2:0:0:1\n", &config).unwrap();
        assert_eq!(report.points.len(), 2);
        assert_eq!(report.lines_skipped, 0);
    }
}

#[test]
fn test_threaded_backpressure_with_tiny_channel() {
    let input: String = (0..2000).map(|i| format!("{i}:0:0:1\n")).collect();
    let loader = ThreadedLoader {
        workers: 4,
        channel_capacity: 1,
        batch_size: 1,
        skip_policy: SkipPolicy::Silent,
    };
    let report = loader.ingest(input.as_bytes()).unwrap();
    assert_eq!(report.points.len(), 2000);

    let mut xs: Vec<u32> = report.points.iter().map(|p| p.x() as u32).collect();
    xs.sort_unstable();
    assert_eq!(xs, (0..2000).collect::<Vec<u32>>());
}

#[test]
fn test_async_loads_every_line() {
    let input: String = (0..3000)
        .map(|i| {
            if i % 3 == 0 {
                String::from("x:y:z:m\n")
            } else {
                format!("{i}:1:2:0.5\n")
            }
        })
        .collect();
    let loader = AsyncLoader {
        workers: 2,
        skip_policy: SkipPolicy::Silent,
    };
    let report = loader.ingest(input.as_bytes()).unwrap();
    assert_eq!(report.points.len(), 2000);
    assert_eq!(report.lines_skipped, 1000);
    assert_eq!(report.lines_read, 3000);
}

#[test]
fn test_strategies_agree_on_point_set() {
    let input: String = (0..500)
        .map(|i| format!("{}:{}:{}:{}\n", i, i as f64 * 0.5, -(i as f64), 1 + i % 7))
        .collect();
    let expected = sorted(
        load_str(&input, &Config::with_strategy(Strategy::Sequential))
            .unwrap()
            .points,
    );
    for strategy in [Strategy::Threaded, Strategy::Async] {
        let config = Config {
            batch_size: 37,
            ..Config::with_strategy(strategy)
        };
        let points = sorted(load_str(&input, &config).unwrap().points);
        assert_eq!(points, expected, "{strategy:?}");
    }
}

/// Yields its data and then fails, like a file whose disk went away.
#[cfg(test)]
struct FailingReader {
    data: std::io::Cursor<Vec<u8>>,
}

#[cfg(test)]
impl std::io::Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match std::io::Read::read(&mut self.data, buf)? {
            0 => Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")),
            n => Ok(n),
        }
    }
}

#[test]
fn test_read_failure_is_fatal_with_every_strategy() {
    for strategy in STRATEGIES {
        let reader = BufReader::new(FailingReader {
            data: std::io::Cursor::new(b"0:0:0:1\n2:0:0:1\n4:0:0:1\n".to_vec()),
        });
        let config = Config {
            batch_size: 2,
            ..Config::with_strategy(strategy)
        };
        match ingest(reader, &config) {
            Err(Error::Io(err)) => assert_eq!(err.to_string(), "disk gone", "{strategy:?}"),
            other => panic!("{strategy:?}: expected an I/O error, got {other:?}"),
        }
    }
}

#[test]
fn test_load_file_missing_path() {
    let result = load_file("definitely/not/here.txt", &Config::default());
    assert!(matches!(result, Err(Error::Open { .. })));
}

#[test]
fn test_load_file_reads_points() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "0:0:0:1\n0:0:0:1\n0:0:0:2\n").unwrap();

    let report = load_file(file.path(), &Config::default()).unwrap();
    assert_eq!(report.points.len(), 3);
    assert_eq!(report.points.iter().map(|p| p.mass()).sum::<f64>(), 4.0);
}
