//! Session-cached first-party identity
//!
//! The identity check runs at most once per session while it keeps
//! answering with an identity. "Nobody logged in" and failures are not
//! cached, so the next navigation asks again (after the user has been sent
//! to log in, or the backend has recovered). Only `logout` drops a cached
//! identity.

use std::sync::Arc;

use host::{Identity, IdentityCheck};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityStatus {
    Present(Identity),
    Absent,
    Unavailable(String),
}

pub struct SessionIdentity {
    checker: Arc<dyn IdentityCheck>,
    cached: Mutex<Option<Identity>>,
}

impl SessionIdentity {
    pub fn new(checker: Arc<dyn IdentityCheck>) -> Self {
        Self {
            checker,
            cached: Mutex::new(None),
        }
    }

    pub async fn resolve(&self) -> IdentityStatus {
        let mut cached = self.cached.lock().await;
        if let Some(identity) = cached.as_ref() {
            return IdentityStatus::Present(identity.clone());
        }

        match self.checker.check().await {
            Ok(Some(identity)) => {
                debug!(user = %identity.user_id, "first-party identity resolved");
                *cached = Some(identity.clone());
                IdentityStatus::Present(identity)
            }
            Ok(None) => IdentityStatus::Absent,
            Err(e) => {
                warn!(error = %e, "identity check failed");
                IdentityStatus::Unavailable(e.to_string())
            }
        }
    }

    pub async fn current(&self) -> Option<Identity> {
        self.cached.lock().await.clone()
    }

    pub async fn logout(&self) {
        *self.cached.lock().await = None;
    }
}
