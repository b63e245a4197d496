//! Fakes shared by the unit tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use bdk_core::{AuthSession, BdkError, Clock, SessionRefresher, SessionTokens};

/// Clock that records requested sleeps and returns immediately.
#[derive(Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn now_millis(&self) -> i64 {
        0
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Refresher that numbers the tokens it hands out.
pub struct CountingRefresher {
    calls: AtomicU32,
    fail: bool,
}

impl CountingRefresher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail: true,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRefresher for CountingRefresher {
    async fn authenticate(&self) -> Result<SessionTokens, BdkError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(BdkError::from_status(403, "account disabled"));
        }
        Ok(SessionTokens::new(format!("session-{n}"), Some(format!("km-{n}"))))
    }
}

/// Session holding `initial` tokens, refreshed through `refresher`.
pub fn session_with(refresher: &Arc<CountingRefresher>) -> Arc<AuthSession> {
    Arc::new(AuthSession::new(
        SessionTokens::new("initial", Some("initial-km".to_string())),
        refresher.clone(),
    ))
}
