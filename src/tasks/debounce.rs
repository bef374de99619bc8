//! An explicit, cancellable debounce timer: arming (re)schedules the
//! deadline, cancelling clears it, and `fired` resolves once the quiet
//! period elapses with no further arms.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debounce {
    period: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
        }
    }

    /// Schedules (or reschedules) the deadline `period` from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.period);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the armed deadline passes; pends forever while
    /// unarmed. Intended for use as one `select!` branch — re-arming from
    /// another branch replaces the deadline on the next loop iteration.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
