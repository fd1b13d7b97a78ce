use crate::config::available_workers;
use crate::error::{Error, Result};
use futures::prelude::*;
use tokio::runtime::Runtime;
use tokio::task::spawn;

/// This struct owns the tokio runtime the async loader runs on, together with
/// the `Manager` that decides how many tasks may be in flight.
pub struct Balancer {
    pub manager: Manager,
    pub runtime: Runtime,
}

pub struct Manager {
    pub workers: usize,
    buffer: usize,
}

impl Balancer {
    /// Constructs a new `Balancer` with `async_tasks` runtime threads, each
    /// allowed `buffer` futures in flight.
    pub fn new(async_tasks: usize, buffer: usize) -> Result<Self> {
        // Never ask for more threads than the machine has
        let max_available_threads = available_workers();
        let workers: usize = if async_tasks > max_available_threads {
            log::debug!(
                "async_tasks provided ({async_tasks}) exceeds max_available_threads, \
                 defaulting to {max_available_threads}"
            );
            max_available_threads
        } else {
            async_tasks.max(1)
        };

        // Initialize tokio runtime
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .enable_all()
            .build()
            .map_err(|err| Error::Runtime(format!("failed to start tokio runtime: {err}")))?;

        log::debug!("async balancer activated with {workers} workers");

        Ok(Balancer {
            manager: Manager {
                workers,
                buffer: buffer.max(1),
            },
            runtime,
        })
    }
}

impl Manager {
    /// Maximum number of spawned tasks awaited at once.
    pub fn in_flight(&self) -> usize {
        self.workers * self.buffer
    }

    /// Turns every item into a future with `task`, spawns it on the runtime
    /// and yields the results in submission order, keeping at most
    /// [`in_flight`](Self::in_flight) tasks running. Items are pulled from
    /// `items` lazily, so the stream must be polled inside the runtime.
    pub fn spawn_buffered<I, F, Fut, T>(&self, items: I, task: F) -> impl Stream<Item = Result<T>>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        futures::stream::iter(items.into_iter().map(task))
            .map(|fut| async move {
                spawn(fut)
                    .await
                    .map_err(|err| Error::Runtime(format!("task failed: {err}")))
            })
            .buffered(self.in_flight())
    }
}

#[test]
fn test_spawn_buffered_keeps_submission_order() {
    let balancer = Balancer::new(4, 2).unwrap();
    let manager = &balancer.manager;
    let results: Vec<u64> = balancer.runtime.block_on(async {
        manager
            .spawn_buffered(0..100_u64, |i| async move { i * 2 })
            .map(|result| result.unwrap())
            .collect::<Vec<u64>>()
            .await
    });
    assert_eq!(results, (0..100_u64).map(|i| i * 2).collect::<Vec<_>>());
}

#[test]
fn test_async_balancer_clamps_workers() {
    let balancer = Balancer::new(0, 0).unwrap();
    assert_eq!(balancer.manager.workers, 1);
    assert_eq!(balancer.manager.in_flight(), 1);

    let balancer = Balancer::new(usize::MAX, 1).unwrap();
    assert_eq!(balancer.manager.workers, available_workers());
}
