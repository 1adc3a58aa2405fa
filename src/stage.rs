//! Generic staged worker: one long-lived thread driving a [`StageTask`].
//!
//! Lifecycle: `Idle -> Running -> Stopping -> Stopped`.
//!
//! * [`StagedWorker::start`] runs [`StageTask::configure`] on the caller's
//!   thread, so device acquisition failures surface before any loop exists.
//! * The loop calls [`StageTask::perform_cycle`] until stopped. Cycle errors
//!   and panics are logged and the loop carries on, so the task always
//!   comes back for cleanup.
//! * [`StagedWorker::stop`] signals the loop, joins the thread and only then
//!   runs [`StageTask::cleanup`], exactly once.

use crate::{Error, Result};
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The three capabilities a stage plugs into the worker runtime
pub trait StageTask: Send + 'static {
    /// Name used for the thread and in logs
    fn name(&self) -> &str;

    /// Acquire devices or sockets. Runs once, before the loop starts.
    ///
    /// # Errors
    ///
    /// Any error aborts `start()`
    fn configure(&mut self) -> Result<()>;

    /// One iteration of the stage loop
    ///
    /// # Errors
    ///
    /// Errors are logged by the worker; the loop continues
    fn perform_cycle(&mut self) -> Result<()>;

    /// Release what `configure` acquired
    fn cleanup(&mut self);
}

/// Lifecycle state of a [`StagedWorker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Runs a [`StageTask`] on its own thread
pub struct StagedWorker<T: StageTask> {
    name: String,
    state: StageState,
    /// Owned here while idle; travels into the thread while running
    task: Option<T>,
    stop_signal: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<T>>,
}

impl<T: StageTask> StagedWorker<T> {
    #[must_use]
    pub fn new(task: T) -> Self {
        Self {
            name: task.name().to_string(),
            state: StageState::Idle,
            task: Some(task),
            stop_signal: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Configure the task and launch the loop thread
    ///
    /// If `configure` fails the task is cleaned up and the worker ends in
    /// `Stopped`; it cannot be restarted.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is not idle, configuration fails or
    /// the thread cannot be spawned
    pub fn start(&mut self) -> Result<()> {
        if self.state != StageState::Idle {
            return Err(Error::Stage(format!(
                "{} cannot start from state {:?}",
                self.name, self.state
            )));
        }
        let Some(mut task) = self.task.take() else {
            return Err(Error::Stage(format!("{} has no task", self.name)));
        };

        info!("Starting stage {}", self.name);
        if let Err(e) = task.configure() {
            error!("Stage {} failed to configure: {e}", self.name);
            task.cleanup();
            self.state = StageState::Stopped;
            return Err(e);
        }

        let stop_signal = Arc::clone(&self.stop_signal);
        let name = self.name.clone();
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_loop(task, &name, &stop_signal));

        match spawned {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                self.state = StageState::Running;
                Ok(())
            }
            Err(e) => {
                // The closure, and with it the task, is gone; nothing left to clean up
                self.state = StageState::Stopped;
                Err(Error::Stage(format!("Failed to spawn {} thread: {e}", self.name)))
            }
        }
    }

    /// Stop the loop, wait for it to exit and clean up
    ///
    /// Safe to call in any state: a stopped worker stays stopped, an idle
    /// worker goes straight to `Stopped` without cleanup since it never
    /// configured anything.
    pub fn stop(&mut self) {
        match self.state {
            StageState::Running => {}
            StageState::Idle => {
                self.state = StageState::Stopped;
                return;
            }
            StageState::Stopping | StageState::Stopped => return,
        }

        self.state = StageState::Stopping;
        debug!("Requesting stop of stage {}", self.name);
        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            match handle.join() {
                Ok(mut task) => {
                    task.cleanup();
                    info!("Stage {} stopped", self.name);
                }
                Err(payload) => error!(
                    "Stage {} thread panicked outside a cycle ({}); cleanup skipped",
                    self.name,
                    panic_message(&*payload)
                ),
            }
        }
        self.state = StageState::Stopped;
    }

    #[must_use]
    pub const fn state(&self) -> StageState {
        self.state
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the loop thread is alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl<T: StageTask> Drop for StagedWorker<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<T: StageTask>(mut task: T, name: &str, stop_signal: &AtomicBool) -> T {
    debug!("Stage {name} loop started");
    let mut failures: u64 = 0;
    while !stop_signal.load(Ordering::SeqCst) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.perform_cycle())).unwrap_or_else(|payload| {
            Err(Error::Stage(format!("cycle panicked: {}", panic_message(&*payload))))
        });
        match outcome {
            Ok(()) => failures = 0,
            Err(e) => {
                failures += 1;
                // Only the first of a streak at warn, the rest would flood the log
                if failures == 1 {
                    warn!("Stage {name} cycle failed: {e}");
                } else {
                    debug!("Stage {name} cycle failed ({failures} in a row): {e}");
                }
            }
        }
    }
    debug!("Stage {name} loop exiting");
    task
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        configured: AtomicUsize,
        cycles: AtomicUsize,
        cleanups: AtomicUsize,
    }

    struct CountingTask {
        counters: Arc<Counters>,
        fail_configure: bool,
        fail_every_cycle: bool,
        panic_on_cycle: Option<usize>,
    }

    impl CountingTask {
        fn new(counters: &Arc<Counters>) -> Self {
            Self {
                counters: Arc::clone(counters),
                fail_configure: false,
                fail_every_cycle: false,
                panic_on_cycle: None,
            }
        }
    }

    impl StageTask for CountingTask {
        fn name(&self) -> &str {
            "counting"
        }

        fn configure(&mut self) -> Result<()> {
            self.counters.configured.fetch_add(1, Ordering::SeqCst);
            if self.fail_configure {
                return Err(Error::Device("no such device".to_string()));
            }
            Ok(())
        }

        fn perform_cycle(&mut self) -> Result<()> {
            let cycle = self.counters.cycles.fetch_add(1, Ordering::SeqCst) + 1;
            thread::sleep(Duration::from_millis(1));
            if self.panic_on_cycle == Some(cycle) {
                panic!("device driver bug in cycle {cycle}");
            }
            if self.fail_every_cycle {
                return Err(Error::FrameRead("bad frame".to_string()));
            }
            Ok(())
        }

        fn cleanup(&mut self) {
            self.counters.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for_cycles(counters: &Counters, n: usize) {
        for _ in 0..1000 {
            if counters.cycles.load(Ordering::SeqCst) >= n {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("stage never reached {n} cycles");
    }

    #[test]
    fn test_lifecycle() {
        let counters = Arc::new(Counters::default());
        let mut worker = StagedWorker::new(CountingTask::new(&counters));
        assert_eq!(worker.state(), StageState::Idle);

        worker.start().unwrap();
        assert_eq!(worker.state(), StageState::Running);
        wait_for_cycles(&counters, 3);

        worker.stop();
        assert_eq!(worker.state(), StageState::Stopped);
        assert!(!worker.is_running());
        assert_eq!(counters.configured.load(Ordering::SeqCst), 1);
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 1);

        // No cycles after stop returned
        let cycles = counters.cycles.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(counters.cycles.load(Ordering::SeqCst), cycles);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let counters = Arc::new(Counters::default());
        let mut worker = StagedWorker::new(CountingTask::new(&counters));
        worker.start().unwrap();
        worker.stop();
        worker.stop();
        drop(worker);
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_configure_failure_is_fatal() {
        let counters = Arc::new(Counters::default());
        let mut task = CountingTask::new(&counters);
        task.fail_configure = true;
        let mut worker = StagedWorker::new(task);

        assert!(matches!(worker.start(), Err(Error::Device(_))));
        assert_eq!(worker.state(), StageState::Stopped);
        assert_eq!(counters.cycles.load(Ordering::SeqCst), 0);
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 1);

        worker.stop();
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cycle_errors_do_not_stop_loop() {
        let counters = Arc::new(Counters::default());
        let mut task = CountingTask::new(&counters);
        task.fail_every_cycle = true;
        let mut worker = StagedWorker::new(task);
        worker.start().unwrap();
        wait_for_cycles(&counters, 5);
        assert!(worker.is_running());
        worker.stop();
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_cycle_still_cleans_up() {
        let counters = Arc::new(Counters::default());
        let mut task = CountingTask::new(&counters);
        task.panic_on_cycle = Some(2);
        let mut worker = StagedWorker::new(task);
        worker.start().unwrap();

        // The loop survives the panic and keeps cycling
        wait_for_cycles(&counters, 5);
        assert!(worker.is_running());

        worker.stop();
        assert_eq!(worker.state(), StageState::Stopped);
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("formatted 3"));
        assert_eq!(panic_message(&*payload), "formatted 3");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }

    #[test]
    fn test_cannot_restart() {
        let counters = Arc::new(Counters::default());
        let mut worker = StagedWorker::new(CountingTask::new(&counters));
        worker.start().unwrap();
        assert!(matches!(worker.start(), Err(Error::Stage(_))));
        worker.stop();
        assert!(matches!(worker.start(), Err(Error::Stage(_))));
    }

    #[test]
    fn test_stop_idle_skips_cleanup() {
        let counters = Arc::new(Counters::default());
        let mut worker = StagedWorker::new(CountingTask::new(&counters));
        worker.stop();
        assert_eq!(worker.state(), StageState::Stopped);
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_stops_running_worker() {
        let counters = Arc::new(Counters::default());
        let mut worker = StagedWorker::new(CountingTask::new(&counters));
        worker.start().unwrap();
        drop(worker);
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 1);
    }
}
