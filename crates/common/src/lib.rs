//! Common types shared by the gate crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
