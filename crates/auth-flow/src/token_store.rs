//! Elevated access token lifecycle
//!
//! Two storage scopes:
//! - durable: the token value, written to a 0600 JSON file and reloaded on
//!   start
//! - volatile: `ensured`, "validated against the provider this session",
//!   which always starts false
//!
//! Any change of the token value resets `ensured`. The lock is held across
//! the identity probe, so concurrent `ensure_token` calls wait for the first
//! probe and then short-circuit on its result.

use std::path::PathBuf;

use common::Secret;
use host::IdentityProbe;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ephemeral::write_atomic;
use crate::error::{Error, Result};
use crate::metrics;

#[derive(Default)]
struct TokenState {
    access_token: Option<Secret<String>>,
    ensured: bool,
}

#[derive(Serialize, Deserialize)]
struct DurableToken {
    access_token: Option<Secret<String>>,
}

/// Read-only view for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenStatus {
    pub present: bool,
    pub ensured: bool,
}

pub struct TokenStore {
    durable: Option<PathBuf>,
    state: Mutex<TokenState>,
}

impl TokenStore {
    /// Both scopes in memory.
    pub fn volatile() -> Self {
        Self {
            durable: None,
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Load the durable token from `path` (absent file = no token).
    /// `ensured` starts false regardless of what was stored.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let access_token = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                serde_json::from_str::<DurableToken>(&contents)
                    .map_err(|e| Error::Storage(format!("parsing {}: {e}", path.display())))?
                    .access_token
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::Storage(format!("reading {}: {e}", path.display()))),
        };
        info!(
            path = %path.display(),
            present = access_token.is_some(),
            "loaded access token"
        );

        Ok(Self {
            durable: Some(path),
            state: Mutex::new(TokenState {
                access_token,
                ensured: false,
            }),
        })
    }

    /// Commit a freshly issued token. It still has to be ensured.
    pub async fn set_token(&self, token: Secret<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access_token = Some(token);
        state.ensured = false;
        self.persist(&state).await
    }

    pub async fn invalidate(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.invalidate_locked(&mut state).await
    }

    /// Probe the token once if it is present and not yet ensured.
    ///
    /// Returns whether a validated token is available afterwards. A failed
    /// probe invalidates the token.
    pub async fn ensure_token(&self, probe: &dyn IdentityProbe) -> bool {
        let mut state = self.state.lock().await;
        if state.access_token.is_none() {
            return false;
        }
        if state.ensured {
            return true;
        }
        self.probe_locked(&mut state, probe).await
    }

    /// Probe the token even if it was already ensured this session.
    pub async fn revalidate(&self, probe: &dyn IdentityProbe) -> bool {
        let mut state = self.state.lock().await;
        if state.access_token.is_none() {
            return false;
        }
        self.probe_locked(&mut state, probe).await
    }

    pub async fn access_token(&self) -> Option<Secret<String>> {
        self.state.lock().await.access_token.clone()
    }

    pub async fn is_ensured(&self) -> bool {
        self.state.lock().await.ensured
    }

    pub async fn status(&self) -> TokenStatus {
        let state = self.state.lock().await;
        TokenStatus {
            present: state.access_token.is_some(),
            ensured: state.ensured,
        }
    }

    async fn probe_locked(&self, state: &mut TokenState, probe: &dyn IdentityProbe) -> bool {
        let Some(token) = state.access_token.clone() else {
            return false;
        };
        match probe.probe(&token).await {
            Ok(()) => {
                state.ensured = true;
                metrics::record_probe("ok");
                debug!("access token ensured");
                true
            }
            Err(e) => {
                let err = Error::TokenValidation(e.to_string());
                warn!(error = %err, "identity probe failed, dropping access token");
                metrics::record_probe("failed");
                if let Err(e) = self.invalidate_locked(state).await {
                    warn!(error = %e, "failed to clear durable token");
                }
                false
            }
        }
    }

    async fn invalidate_locked(&self, state: &mut TokenState) -> Result<()> {
        state.access_token = None;
        state.ensured = false;
        self.persist(state).await
    }

    async fn persist(&self, state: &TokenState) -> Result<()> {
        let Some(path) = &self.durable else {
            return Ok(());
        };
        match &state.access_token {
            Some(token) => {
                write_atomic(
                    path,
                    &DurableToken {
                        access_token: Some(token.clone()),
                    },
                )
                .await
            }
            None => match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Storage(format!("removing {}: {e}", path.display()))),
            },
        }
    }
}
