//! Elevated-auth navigation flow
//!
//! Gates protected routes on an OAuth2 authorization-code + PKCE token that
//! is separate from the first-party session identity. The flow is
//! interrupted by a full navigation to the provider and back, so everything
//! it needs afterwards is committed to storage first.
//!
//! Flow:
//! 1. `Tab::navigate` runs the `NavigationGuard` for the target route
//! 2. The guard resolves the first-party identity (session-cached), then the
//!    route's "requires elevated" flag
//! 3. Elevated routes need an ensured token from `TokenStore`; without one
//!    the user is asked for consent
//! 4. On consent, `AuthorizationRedirector` stores the verifier and the
//!    resumption routes in `PendingAuthStore` and navigates away
//! 5. The provider redirects to the callback route; `CallbackHandler`
//!    redeems the state, exchanges the code, and always empties the store
//! 6. The tab follows the resumption as a fresh guarded navigation

pub mod callback;
pub mod ephemeral;
pub mod error;
pub mod flight;
pub mod guard;
pub mod identity;
pub mod metrics;
pub mod pending;
pub mod redirector;
pub mod routes;
pub mod tab;
pub mod token_store;

#[cfg(test)]
mod test_support;

pub use callback::{CallbackHandler, CallbackOutcome, CallbackQuery, CallbackResult};
pub use ephemeral::EphemeralStore;
pub use error::{Error, Result};
pub use flight::RedirectFlight;
pub use guard::{GuardParts, Navigation, NavigationGuard, Outcome, handle_event};
pub use identity::{IdentityStatus, SessionIdentity};
pub use pending::{PendingAuthStore, PendingNavigation};
pub use redirector::AuthorizationRedirector;
pub use routes::{RouteRule, RouteTable};
pub use tab::{Collaborators, Landing, MAX_RESUMPTIONS, Tab, TabSettings, TabStatus};
pub use token_store::{TokenStatus, TokenStore};
