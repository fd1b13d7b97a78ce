use crate::constants::SEMI_SPINLOCK_MILLIS;
use crate::error::{Error, Result};
use std::thread::{spawn, JoinHandle};

type Handles<T> = Vec<JoinHandle<T>>;

/// This struct keeps at most `workers` threads alive at once on this node and
/// collects whatever they return.
pub struct Balancer<T> {
    pub workers: usize,
    handles: Handles<T>,
    results: Vec<T>,
}

impl<T: Send + 'static> Balancer<T> {
    /// Constructs a new `Balancer` allowing `workers` concurrent threads (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        log::debug!("balancer activated with {workers} workers");

        Balancer {
            workers,
            handles: vec![],
            results: vec![],
        }
    }

    /// Spawns `f` on a new thread, first waiting for a free worker.
    pub fn spawn<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce() -> T,
        F: Send + 'static,
    {
        self.wait_limit()?;
        self.handles.push(spawn(f));
        Ok(())
    }

    /// Number of threads that have been spawned and not yet joined.
    pub fn in_flight(&self) -> usize {
        self.handles.len()
    }

    /// Waits for all threads to finish and hands back their results. The
    /// order of the results is the order in which the threads were joined.
    pub fn wait(&mut self) -> Result<Vec<T>> {
        while let Some(handle) = self.handles.pop() {
            self.results.push(join(handle)?);
        }
        Ok(std::mem::take(&mut self.results))
    }

    /// Wait until there is a free worker
    fn wait_limit(&mut self) -> Result<()> {
        while self.handles.len() >= self.workers {
            semi_spinlock();
            self.join_finished()?;
        }
        Ok(())
    }

    fn join_finished(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.handles.len() {
            if self.handles[i].is_finished() {
                let handle = self.handles.swap_remove(i);
                self.results.push(join(handle)?);
            } else {
                i += 1;
            }
        }
        Ok(())
    }
}

fn join<T>(handle: JoinHandle<T>) -> Result<T> {
    handle
        .join()
        .map_err(|_| Error::Runtime(String::from("worker thread panicked")))
}

fn semi_spinlock() {
    std::thread::sleep(std::time::Duration::from_millis(SEMI_SPINLOCK_MILLIS))
}

#[test]
fn test_balancer_collects_every_result() {
    let mut balancer = Balancer::new(3);
    for i in 0..20_u64 {
        balancer.spawn(move || i * i).unwrap();
        assert!(balancer.in_flight() <= 3);
    }
    let mut results = balancer.wait().unwrap();
    results.sort_unstable();
    assert_eq!(results, (0..20_u64).map(|i| i * i).collect::<Vec<_>>());
    assert_eq!(balancer.in_flight(), 0);
}

#[test]
fn test_balancer_zero_workers_still_runs() {
    let mut balancer = Balancer::new(0);
    assert_eq!(balancer.workers, 1);
    balancer.spawn(|| 7).unwrap();
    balancer.spawn(|| 8).unwrap();
    let mut results = balancer.wait().unwrap();
    results.sort_unstable();
    assert_eq!(results, vec![7, 8]);
}

#[test]
fn test_balancer_reports_panicking_worker() {
    let mut balancer: Balancer<()> = Balancer::new(2);
    balancer.spawn(|| panic!("boom")).unwrap();
    assert!(matches!(balancer.wait(), Err(Error::Runtime(_))));
}
