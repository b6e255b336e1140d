//! Deferred execution of after-hooks.
//!
//! Writes push their after-hooks here only once their transaction has
//! committed. Each queued hook runs at most once, in the order it was
//! scheduled, and its failure is logged rather than returned.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use crate::config::DispatchMode;
use crate::observer::error::{FlushReport, HookError};
use crate::observer::traits::HookPoint;

pub type HookTask = BoxFuture<'static, Result<(), HookError>>;

/// One after-hook invocation waiting to run
pub struct ScheduledHook {
    pub model: &'static str,
    pub point: HookPoint,
    task: HookTask,
}

impl ScheduledHook {
    pub fn new(model: &'static str, point: HookPoint, task: HookTask) -> Self {
        Self { model, point, task }
    }
}

struct SchedulerState {
    queue: Mutex<VecDeque<ScheduledHook>>,
    // Serializes drains so hooks never run concurrently with each other
    drain: tokio::sync::Mutex<()>,
    mode: DispatchMode,
}

/// Shared queue of after-hooks. Cloning shares the queue.
#[derive(Clone)]
pub struct HookScheduler {
    state: Arc<SchedulerState>,
}

impl HookScheduler {
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            state: Arc::new(SchedulerState {
                queue: Mutex::new(VecDeque::new()),
                drain: tokio::sync::Mutex::new(()),
                mode,
            }),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.state.mode
    }

    /// Queue hooks without running them
    pub fn schedule(&self, hooks: impl IntoIterator<Item = ScheduledHook>) {
        let mut queue = self.lock_queue();
        for hook in hooks {
            tracing::trace!("Scheduled {} hook for {}", hook.point, hook.model);
            queue.push_back(hook);
        }
    }

    /// Number of hooks queued and not yet started
    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    /// Start draining according to the dispatch mode.
    ///
    /// `Spawn` drains on the current tokio runtime; outside a runtime the
    /// hooks stay queued until someone calls `flush`. `Manual` does nothing.
    pub fn release(&self) {
        if self.state.mode == DispatchMode::Manual {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let scheduler = self.clone();
                handle.spawn(async move {
                    let report = scheduler.flush().await;
                    if report.failed > 0 {
                        tracing::debug!("Background hook drain finished with {} failures", report.failed);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("No tokio runtime available, {} after-hooks left queued", self.pending());
            }
        }
    }

    /// Run every queued hook, including ones queued while draining
    pub async fn flush(&self) -> FlushReport {
        let _drain = self.state.drain.lock().await;
        let mut report = FlushReport::default();

        while let Some(hook) = self.next() {
            let ScheduledHook { model, point, task } = hook;
            report.executed += 1;

            let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(HookError::Panicked(panic_message(panic.as_ref()))),
            };

            if let Err(e) = outcome {
                report.failed += 1;
                tracing::warn!("{} hook for {} failed: {}", point, model, e);
            }
        }

        report
    }

    fn next(&self) -> Option<ScheduledHook> {
        self.lock_queue().pop_front()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<ScheduledHook>> {
        // Tasks never run while the guard is held, so a poisoned queue is still consistent
        self.state.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for HookScheduler {
    fn default() -> Self {
        Self::new(DispatchMode::default())
    }
}

impl std::fmt::Debug for HookScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookScheduler")
            .field("mode", &self.state.mode)
            .field("pending", &self.pending())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
