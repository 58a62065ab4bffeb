//! The interaction thread and the surface that presents tasks to the user.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::value::Value;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single worker thread that owns all user-facing work.
///
/// Jobs run in submission order. Code already running on the interaction
/// thread executes `invoke_and_wait` jobs inline instead of deadlocking.
pub struct InteractionThread {
    sender: Mutex<Option<Sender<Job>>>,
    thread_id: ThreadId,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl InteractionThread {
    pub fn spawn() -> Result<Arc<Self>, EngineError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let join = thread::Builder::new()
            .name("interaction".to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
                debug!("interaction thread stopped");
            })
            .map_err(|err| {
                warn!(%err, "failed to spawn interaction thread");
                EngineError::InteractionThreadGone
            })?;
        Ok(Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            thread_id: join.thread().id(),
            join: Mutex::new(Some(join)),
        }))
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queue `job` without waiting for it.
    pub fn invoke_later(&self, job: impl FnOnce() + Send + 'static) -> Result<(), EngineError> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender
                .send(Box::new(job))
                .map_err(|_| EngineError::InteractionThreadGone),
            None => Err(EngineError::InteractionThreadGone),
        }
    }

    /// Run `job` on the interaction thread and wait for its result.
    pub fn invoke_and_wait<R, F>(&self, job: F) -> Result<R, EngineError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.invoke_later(move || {
            let _ = tx.send(job());
        })?;
        rx.recv().map_err(|_| EngineError::InteractionThreadGone)
    }

    /// Stop accepting jobs and join the worker once queued jobs ran.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if self.is_current() {
            return;
        }
        let join = self.join.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(join) = join {
            if join.join().is_err() {
                warn!("interaction thread panicked");
            }
        }
    }
}

impl Drop for InteractionThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// What a task asks the surface to present.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptContent {
    /// Task-specific stimulus.
    Stimulus(serde_json::Value),
    /// Plain message, e.g. level change feedback.
    Message(String),
    /// Ask for a rating within `min..=max`.
    ConfidenceRating { min: i64, max: i64 },
}

/// Callback that turns a user response into a task completion.
///
/// Returns `Ok(true)` when the response finished the task and `Ok(false)` when
/// the task had already been finished by someone else.
#[derive(Clone)]
pub struct Responder(Arc<dyn Fn(Value) -> Result<bool, EngineError> + Send + Sync>);

impl Responder {
    pub fn new(f: impl Fn(Value) -> Result<bool, EngineError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn respond(&self, input: Value) -> Result<bool, EngineError> {
        (self.0)(input)
    }
}

pub struct TaskPrompt {
    pub leaf_id: String,
    pub content: PromptContent,
    pub responder: Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusPanel {
    Level,
    TrialCount,
    Feedback,
}

/// The user-facing side of the engine. Called on the interaction thread.
pub trait InteractionSurface: Send + Sync {
    fn present(&self, prompt: TaskPrompt);

    fn update_status(&self, _panel: StatusPanel, _value: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_and_wait_runs_on_the_worker() {
        let thread = InteractionThread::spawn().expect("spawn");
        let inner = Arc::clone(&thread);
        let on_worker = thread
            .invoke_and_wait(move || inner.is_current())
            .expect("invoke");
        assert!(on_worker);
        assert!(!thread.is_current());
    }

    #[test]
    fn nested_invoke_runs_inline() {
        let thread = InteractionThread::spawn().expect("spawn");
        let inner = Arc::clone(&thread);
        let value = thread
            .invoke_and_wait(move || inner.invoke_and_wait(|| 41 + 1))
            .expect("outer")
            .expect("inner");
        assert_eq!(value, 42);
    }

    #[test]
    fn shutdown_rejects_new_jobs() {
        let thread = InteractionThread::spawn().expect("spawn");
        thread.shutdown();
        assert!(matches!(
            thread.invoke_later(|| {}),
            Err(EngineError::InteractionThreadGone)
        ));
    }
}
