use std::future::Future;

use chrono::{DateTime, Utc};
use rocket::tokio::{self, task::JoinHandle};

/// One voter's ballot countdown: a spawned task that sleeps until the
/// deadline and then runs its expiry action.
pub struct Countdown {
    deadline: DateTime<Utc>,
    expiry: JoinHandle<()>,
}

impl Countdown {
    /// Run `on_expiry` once `deadline` has passed. A deadline in the past
    /// expires straight away.
    pub fn start<F>(deadline: DateTime<Utc>, on_expiry: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();
        let expiry = tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            on_expiry.await
        });
        Self { deadline, expiry }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Stop the countdown. Returns true if it had already expired.
    pub async fn cancel(self) -> bool {
        self.expiry.abort();
        self.expiry.await.is_ok()
    }
}
