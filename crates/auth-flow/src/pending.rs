//! In-flight flow state that must survive the provider round trip
//!
//! Two kinds of entries share one tab-scoped store:
//! - `code-verifier-<state>`: the PKCE verifier, redeemable once
//! - `next-route` / `previous-route`: where to resume after the callback

use common::Secret;

use crate::ephemeral::EphemeralStore;
use crate::error::Result;

const VERIFIER_PREFIX: &str = "code-verifier-";
const NEXT_ROUTE: &str = "next-route";
const PREVIOUS_ROUTE: &str = "previous-route";

/// Resumption targets recorded before leaving for the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingNavigation {
    pub next: Option<String>,
    pub previous: Option<String>,
}

pub struct PendingAuthStore {
    store: EphemeralStore,
}

fn verifier_key(state: &str) -> String {
    format!("{VERIFIER_PREFIX}{state}")
}

impl PendingAuthStore {
    pub fn new(store: EphemeralStore) -> Self {
        Self { store }
    }

    pub fn in_process() -> Self {
        Self::new(EphemeralStore::in_process())
    }

    pub async fn put(&self, state: &str, verifier: &Secret<String>) -> Result<()> {
        self.store.put(&verifier_key(state), verifier.expose()).await
    }

    /// Redeem the verifier for `state`. Destructive: a replayed state finds
    /// nothing.
    pub async fn take(&self, state: &str) -> Result<Option<Secret<String>>> {
        Ok(self.store.take(&verifier_key(state)).await?.map(Secret::new))
    }

    /// Record the resumption targets. A `None` previous route clears any
    /// stale one.
    pub async fn set_pending(&self, next: &str, previous: Option<&str>) -> Result<()> {
        self.store.put(NEXT_ROUTE, next).await?;
        match previous {
            Some(previous) => self.store.put(PREVIOUS_ROUTE, previous).await,
            None => self.store.take(PREVIOUS_ROUTE).await.map(|_| ()),
        }
    }

    /// Read and clear both resumption targets, present or not.
    pub async fn take_pending(&self) -> Result<PendingNavigation> {
        let next = self.store.take(NEXT_ROUTE).await?;
        let previous = self.store.take(PREVIOUS_ROUTE).await?;
        Ok(PendingNavigation { next, previous })
    }

    /// Non-destructive view of the resumption targets.
    pub async fn pending(&self) -> PendingNavigation {
        PendingNavigation {
            next: self.store.get(NEXT_ROUTE).await,
            previous: self.store.get(PREVIOUS_ROUTE).await,
        }
    }

    /// Forget every verifier and both routes.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear().await
    }

    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }
}
