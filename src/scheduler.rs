//! Cancelable timers for the refresh cycles.
//!
//! Each `TimerKind` has at most one pending timer. Arming a kind clears its
//! pending timer first. A timer that fires leaves its slot before running its
//! job, so the job may re-arm its own kind without cancelling itself.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::AbortHandle;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    CompetitionRefresh,
    LeaderboardRefresh,
    PreloaderWatchdog,
}

struct Slot {
    id: u64,
    handle: AbortHandle,
}

#[derive(Default)]
pub struct Scheduler {
    slots: Mutex<HashMap<TimerKind, Slot>>,
    next_id: AtomicU64,
    epoch: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bumped by `stop_all`. Cycles capture it when they start and only
    /// re-arm if it is unchanged when they finish.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn schedule(self: &Arc<Self>, kind: TimerKind, delay: Duration, job: BoxFuture<'static, ()>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let scheduler = Arc::downgrade(self);
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(_) => return,
        };
        if let Some(previous) = slots.remove(&kind) {
            previous.handle.abort();
        }
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(scheduler) = scheduler.upgrade() {
                scheduler.fired(kind, id);
            }
            job.await;
        });
        slots.insert(
            kind,
            Slot {
                id,
                handle: task.abort_handle(),
            },
        );
    }

    /// Arms only if no `stop_all` happened since `epoch` was read.
    pub fn schedule_if_current(
        self: &Arc<Self>,
        epoch: u64,
        kind: TimerKind,
        delay: Duration,
        job: BoxFuture<'static, ()>,
    ) -> bool {
        if self.epoch() != epoch {
            debug!(?kind, "activity stopped; not re-arming");
            return false;
        }
        self.schedule(kind, delay, job);
        true
    }

    /// Fixed-rate repetition. The first run happens one `period` from now.
    pub fn every<F, Fut>(self: &Arc<Self>, kind: TimerKind, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(_) => return,
        };
        if let Some(previous) = slots.remove(&kind) {
            previous.handle.abort();
        }
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                job().await;
            }
        });
        slots.insert(
            kind,
            Slot {
                id,
                handle: task.abort_handle(),
            },
        );
    }

    fn fired(&self, kind: TimerKind, id: u64) {
        if let Ok(mut slots) = self.slots.lock() {
            if slots.get(&kind).map(|slot| slot.id) == Some(id) {
                slots.remove(&kind);
            }
        }
    }

    pub fn cancel(&self, kind: TimerKind) -> bool {
        let slot = self.slots.lock().ok().and_then(|mut slots| slots.remove(&kind));
        match slot {
            Some(slot) => {
                slot.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let drained: Vec<Slot> = match self.slots.lock() {
            Ok(mut slots) => slots.drain().map(|(_, slot)| slot).collect(),
            Err(_) => return,
        };
        for slot in drained {
            slot.handle.abort();
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.live_timers(kind) > 0
    }

    pub fn live_timers(&self, kind: TimerKind) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.get(&kind).map(|slot| !slot.handle.is_finished()).unwrap_or(false) as usize)
            .unwrap_or(0)
    }
}
