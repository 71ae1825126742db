use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

pub type Recovery = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Spinner {
    shown_at: Option<Instant>,
    recovery: Option<Recovery>,
}

/// Loading-spinner bookkeeping watched by the preloader watchdog.
#[derive(Default)]
pub struct Preloader {
    spinner: Mutex<Spinner>,
}

impl Preloader {
    pub fn show(&self, recovery: Option<Recovery>) {
        if let Ok(mut spinner) = self.spinner.lock() {
            spinner.shown_at = Some(Instant::now());
            spinner.recovery = recovery;
        }
    }

    pub fn hide(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            spinner.shown_at = None;
            spinner.recovery = None;
        }
    }

    pub fn is_active(&self) -> bool {
        self.spinner
            .lock()
            .map(|spinner| spinner.shown_at.is_some())
            .unwrap_or(false)
    }

    /// Hides a spinner that has been up longer than `threshold` and hands
    /// back its recovery callback. `None` when nothing is stale.
    pub fn take_stale(&self, threshold: Duration) -> Option<Option<Recovery>> {
        let mut spinner = self.spinner.lock().ok()?;
        let shown_at = spinner.shown_at?;
        if shown_at.elapsed() <= threshold {
            return None;
        }
        spinner.shown_at = None;
        Some(spinner.recovery.take())
    }
}
