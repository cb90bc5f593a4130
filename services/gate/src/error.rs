//! Service-specific error types

use std::net::SocketAddr;

use thiserror::Error;

/// Gate startup and terminal errors.
///
/// Auth-flow failures never show up here: they degrade to "no elevated
/// token" inside the tab and are only logged.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid tab name {0:?}: use letters, digits, '-' or '_'")]
    TabName(String),

    #[error("failed to open tab storage: {0}")]
    Storage(#[from] auth_flow::Error),

    #[error("failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("terminal input failed: {0}")]
    Input(#[source] std::io::Error),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
