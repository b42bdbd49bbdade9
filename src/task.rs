use crate::error::ModError;
use anyhow::Result;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

/// Interval at which the interactive loop polls a running task.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);
const INDICATOR_CYCLE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed {
        label: String,
    },
    /// The task returned an error; `error` is the single operator-facing line.
    Failed {
        label: String,
        error: String,
    },
    Panicked {
        label: String,
        message: String,
    },
}

impl TaskOutcome {
    pub fn label(&self) -> &str {
        match self {
            TaskOutcome::Completed { label }
            | TaskOutcome::Failed { label, .. }
            | TaskOutcome::Panicked { label, .. } => label,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            TaskOutcome::Completed { .. } => None,
            TaskOutcome::Failed { label, error } => Some(format!("{label} failed: {error}")),
            TaskOutcome::Panicked { label, message } => {
                Some(format!("{label} stopped unexpectedly: {message}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Idle,
    Running { indicator: String },
    Finished(TaskOutcome),
}

struct RunningTask {
    label: String,
    rx: Receiver<TaskOutcome>,
    handle: Option<JoinHandle<()>>,
    ticks: usize,
}

/// Runs at most one long operation on a worker thread. The owner polls
/// [`TaskRunner::poll`] on its own schedule; there is no cancellation.
#[derive(Default)]
pub struct TaskRunner {
    running: Option<RunningTask>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.running.is_some()
    }

    pub fn start<F>(&mut self, label: impl Into<String>, task: F) -> Result<(), ModError>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        if self.running.is_some() {
            return Err(ModError::TaskRunning);
        }

        let label = label.into();
        let (tx, rx) = mpsc::sync_channel(1);
        let worker_label = label.clone();
        let handle = thread::spawn(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => TaskOutcome::Completed {
                    label: worker_label,
                },
                Ok(Err(err)) => TaskOutcome::Failed {
                    label: worker_label,
                    error: format!("{err:#}"),
                },
                Err(payload) => TaskOutcome::Panicked {
                    label: worker_label,
                    message: panic_message(payload.as_ref()),
                },
            };
            let _ = tx.send(outcome);
        });

        self.running = Some(RunningTask {
            label,
            rx,
            handle: Some(handle),
            ticks: 0,
        });
        Ok(())
    }

    /// One tick of the polling loop. Returns `Finished` exactly once per task,
    /// after which the runner is idle again.
    pub fn poll(&mut self) -> TaskStatus {
        let Some(task) = self.running.as_mut() else {
            return TaskStatus::Idle;
        };

        let outcome = match task.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => {
                let indicator = progress_indicator(&task.label, task.ticks);
                task.ticks += 1;
                return TaskStatus::Running { indicator };
            }
            Err(TryRecvError::Disconnected) => TaskOutcome::Panicked {
                label: task.label.clone(),
                message: "worker exited without reporting".to_string(),
            },
        };

        if let Some(handle) = task.handle.take() {
            let _ = handle.join();
        }
        self.running = None;
        TaskStatus::Finished(outcome)
    }
}

/// Label framed by `tick % 5` dots on both sides.
pub fn progress_indicator(label: &str, tick: usize) -> String {
    let dots = ".".repeat(tick % INDICATOR_CYCLE);
    format!("{dots} {label} {dots}")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    const FAST: Duration = Duration::from_millis(5);

    fn finish(runner: &mut TaskRunner) -> TaskOutcome {
        loop {
            match runner.poll() {
                TaskStatus::Finished(outcome) => return outcome,
                TaskStatus::Running { .. } => thread::sleep(FAST),
                TaskStatus::Idle => panic!("no task running"),
            }
        }
    }

    #[test]
    fn runs_task_and_reports_completion() {
        let mut runner = TaskRunner::new();
        runner.start("Launching", || Ok(())).unwrap();
        assert!(runner.is_busy());
        let outcome = finish(&mut runner);
        assert_eq!(
            outcome,
            TaskOutcome::Completed {
                label: "Launching".to_string()
            }
        );
        assert!(!runner.is_busy());
        assert_eq!(runner.poll(), TaskStatus::Idle);
    }

    #[test]
    fn refuses_second_task_while_busy() {
        let gate = Arc::new(Barrier::new(2));
        let worker_gate = gate.clone();
        let mut runner = TaskRunner::new();
        runner
            .start("First", move || {
                worker_gate.wait();
                Ok(())
            })
            .unwrap();

        assert_eq!(runner.start("Second", || Ok(())), Err(ModError::TaskRunning));
        assert_eq!(
            runner.poll(),
            TaskStatus::Running {
                indicator: " First ".to_string()
            }
        );

        gate.wait();
        assert_eq!(finish(&mut runner).label(), "First");
        runner.start("Second", || Ok(())).unwrap();
        assert_eq!(finish(&mut runner).label(), "Second");
    }

    #[test]
    fn errors_become_a_single_message() {
        let mut runner = TaskRunner::new();
        runner
            .start("Loading mods", || {
                Err(anyhow::anyhow!("jar missing")).map_err(|err| err.context("patch step"))
            })
            .unwrap();
        let outcome = finish(&mut runner);
        assert_eq!(
            outcome.error_message().unwrap(),
            "Loading mods failed: patch step: jar missing"
        );
    }

    #[test]
    fn panics_still_finish_the_task() {
        let mut runner = TaskRunner::new();
        runner.start("Extracting", || panic!("boom")).unwrap();
        let outcome = finish(&mut runner);
        assert!(matches!(outcome, TaskOutcome::Panicked { ref message, .. } if message == "boom"));
        assert!(!runner.is_busy());
    }

    #[test]
    fn indicator_cycles_through_five_frames() {
        assert_eq!(progress_indicator("Launching", 0), " Launching ");
        assert_eq!(progress_indicator("Launching", 2), ".. Launching ..");
        assert_eq!(progress_indicator("Launching", 5), " Launching ");
    }
}
