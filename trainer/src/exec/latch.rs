//! One-shot completion latch with single-winner finish semantics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::trace;

use crate::error::EngineError;
use crate::exec::TaskReport;

const IDLE: u64 = u64::MAX;
const OPEN: u64 = 0;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
}

fn current_token() -> u64 {
    THREAD_TOKEN.with(|token| *token)
}

#[derive(Default)]
struct Slot {
    report: Option<TaskReport>,
    finished: bool,
}

/// Finish lock of a blocking task.
///
/// Between [`begin`](Self::begin) and the end of [`wait`](Self::wait) exactly
/// one thread can claim the lock, and only that thread may call
/// [`finish`](Self::finish). Claims that lose the race return `false`.
pub struct FinishLatch {
    task: String,
    owner: AtomicU64,
    slot: Mutex<Slot>,
    done: Condvar,
}

impl FinishLatch {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            owner: AtomicU64::new(IDLE),
            slot: Mutex::new(Slot::default()),
            done: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.owner.load(Ordering::Acquire) != IDLE
    }

    pub fn is_claimed(&self) -> bool {
        let owner = self.owner.load(Ordering::Acquire);
        owner != IDLE && owner != OPEN
    }

    /// Open the latch for a new execution.
    pub fn begin(&self) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning {
                task: self.task.clone(),
            });
        }
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Slot::default();
        self.owner
            .compare_exchange(IDLE, OPEN, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| EngineError::AlreadyRunning {
                task: self.task.clone(),
            })
    }

    /// Try to become the single finisher. The claim is bound to the calling
    /// thread.
    pub fn try_claim(&self) -> bool {
        let won = self
            .owner
            .compare_exchange(OPEN, current_token(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        trace!(task = %self.task, won, "finish lock claim");
        won
    }

    /// Publish the report and wake the waiting scheduler. Must be called by
    /// the thread that claimed the lock.
    pub fn finish(&self, report: TaskReport) -> Result<(), EngineError> {
        let owner = self.owner.load(Ordering::Acquire);
        if owner == OPEN || owner == IDLE {
            return Err(EngineError::FinishWithoutLock {
                task: self.task.clone(),
            });
        }
        if owner != current_token() {
            return Err(EngineError::FinishFromWrongThread {
                task: self.task.clone(),
            });
        }
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.finished {
            return Err(EngineError::AlreadyFinished {
                task: self.task.clone(),
            });
        }
        slot.report = Some(report);
        slot.finished = true;
        self.done.notify_all();
        Ok(())
    }

    /// Block until a finisher published its report, then reset the latch.
    pub fn wait(&self) -> TaskReport {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        while !slot.finished {
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
        let report = slot.report.take().unwrap_or_default();
        self.owner.store(IDLE, Ordering::Release);
        report
    }

    /// Close a latch whose execution never got going.
    pub(crate) fn abandon(&self) {
        self.owner.store(IDLE, Ordering::Release);
    }
}

/// Shareable handle to a running task's finish lock.
#[derive(Clone)]
pub struct FinishHandle {
    latch: Arc<FinishLatch>,
}

impl FinishHandle {
    pub fn new(latch: Arc<FinishLatch>) -> Self {
        Self { latch }
    }

    pub fn claim(&self) -> bool {
        self.latch.try_claim()
    }

    pub fn finish(&self, report: TaskReport) -> Result<(), EngineError> {
        self.latch.finish(report)
    }

    /// Claim and finish in one step. Returns `Ok(false)` when someone else
    /// already won the race.
    pub fn complete(&self, report: TaskReport) -> Result<bool, EngineError> {
        if !self.claim() {
            return Ok(false);
        }
        self.finish(report)?;
        Ok(true)
    }

    pub fn is_claimed(&self) -> bool {
        self.latch.is_claimed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Outcome;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn finish_without_claim_is_rejected() {
        let latch = FinishLatch::new("task");
        latch.begin().expect("begin");
        let err = latch.finish(TaskReport::aborted()).expect_err("no lock");
        assert!(matches!(err, EngineError::FinishWithoutLock { .. }));
    }

    #[test]
    fn claim_is_bound_to_the_claiming_thread() {
        let latch = Arc::new(FinishLatch::new("task"));
        latch.begin().expect("begin");
        assert!(latch.try_claim());
        let other = Arc::clone(&latch);
        let result = thread::spawn(move || other.finish(TaskReport::aborted()))
            .join()
            .expect("join");
        assert!(matches!(
            result,
            Err(EngineError::FinishFromWrongThread { .. })
        ));
        latch.finish(TaskReport::suspended()).expect("owner finishes");
        assert_eq!(latch.wait().outcome, Outcome::Suspended);
        assert!(!latch.is_running());
    }

    #[test]
    fn begin_twice_reports_already_running() {
        let latch = FinishLatch::new("task");
        latch.begin().expect("begin");
        assert!(matches!(
            latch.begin(),
            Err(EngineError::AlreadyRunning { .. })
        ));
    }

    #[test]
    fn exactly_one_of_many_racing_finishers_wins() {
        for _ in 0..50 {
            let latch = Arc::new(FinishLatch::new("task"));
            latch.begin().expect("begin");
            let racers = 8;
            let barrier = Arc::new(Barrier::new(racers));
            let handles: Vec<_> = (0..racers)
                .map(|i| {
                    let handle = FinishHandle::new(Arc::clone(&latch));
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let outcome = if i % 2 == 0 {
                            Outcome::Finished
                        } else {
                            Outcome::Aborted
                        };
                        handle
                            .complete(TaskReport::new(outcome, Vec::new()))
                            .expect("complete")
                    })
                })
                .collect();
            let report = latch.wait();
            let winners = handles
                .into_iter()
                .map(|h| h.join().expect("join"))
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
            assert!(matches!(report.outcome, Outcome::Finished | Outcome::Aborted));
        }
    }

    #[test]
    fn latch_can_be_reused_after_wait() {
        let latch = FinishLatch::new("task");
        for _ in 0..3 {
            latch.begin().expect("begin");
            assert!(latch.try_claim());
            latch.finish(TaskReport::finished(Vec::new())).expect("finish");
            assert_eq!(latch.wait().outcome, Outcome::Finished);
        }
        assert!(!latch.try_claim());
    }
}
