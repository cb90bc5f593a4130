//! Navigation guard
//!
//! Pure state machine: `handle_event(state, event, ..) -> (state, action)`.
//! No I/O happens in the machine itself. [`NavigationGuard`] drives it,
//! performing each action and feeding the result back as the next event
//! until a terminal state is reached.
//!
//! ```text
//! CheckSelfIdentity --present--> CheckRouteRequirement --open--> Allowed
//!        |                               |
//!   absent/failed                    elevated
//!        v                               v
//!     Denied                       EnsureToken --valid--> Allowed
//!                                        |   \--awaiting provider--> Redirecting
//!                                     missing
//!                                        v
//!                                  AwaitConsent --declined--> Denied(resume)
//!                                        |
//!                                    accepted
//!                                        v
//!                                  Redirecting --failed--> Denied(resume)
//! ```

use std::sync::Arc;

use host::{Alerts, ConsentPrompt, FirstPartyLogin, IdentityProbe, NETWORK_ERROR_ALERT};
use tracing::{debug, error, info, warn};

use crate::flight::RedirectFlight;
use crate::identity::{IdentityStatus, SessionIdentity};
use crate::metrics;
use crate::redirector::AuthorizationRedirector;
use crate::routes::{RouteTable, route_path};
use crate::token_store::TokenStore;

/// One attempted route transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub to: String,
    pub from: Option<String>,
}

impl Navigation {
    pub fn new(to: impl Into<String>, from: Option<String>) -> Self {
        Self {
            to: to.into(),
            from,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    CheckSelfIdentity,
    CheckRouteRequirement,
    EnsureToken,
    AwaitConsent,
    /// Control has left for the provider. Terminal for this navigation.
    Redirecting,
    Allowed,
    /// `resume_to` is where navigation continues instead, if anywhere.
    Denied { resume_to: Option<String> },
}

impl GuardState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GuardState::Redirecting | GuardState::Allowed | GuardState::Denied { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    Valid,
    Missing,
    /// No usable token, but this tab already has a redirect outstanding.
    AwaitingProvider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    IdentityPresent,
    IdentityAbsent,
    IdentityUnavailable,
    RouteInspected { requires_elevated: bool },
    TokenChecked(TokenCheck),
    ConsentAnswered { accepted: bool },
    RedirectIssued,
    RedirectFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardAction {
    InspectRoute,
    EnsureToken,
    AskConsent,
    BeginRedirect,
    RequireLogin,
    Alert(&'static str),
    Resume(String),
    Proceed,
    Suspend,
    None,
}

/// Where a declined navigation goes: back to the prior route when there is
/// one that is not the target itself, else to the safe route.
fn decline_target(nav: &Navigation, safe_route: &str) -> String {
    match nav.from.as_deref() {
        Some(previous) if route_path(previous) != route_path(&nav.to) => previous.to_string(),
        _ => safe_route.to_string(),
    }
}

/// Pure state transition. Events that make no sense in a state leave it
/// unchanged with [`GuardAction::None`].
pub fn handle_event(
    state: GuardState,
    event: GuardEvent,
    nav: &Navigation,
    safe_route: &str,
) -> (GuardState, GuardAction) {
    match (state, event) {
        (GuardState::CheckSelfIdentity, GuardEvent::IdentityPresent) => {
            (GuardState::CheckRouteRequirement, GuardAction::InspectRoute)
        }
        (GuardState::CheckSelfIdentity, GuardEvent::IdentityAbsent) => (
            GuardState::Denied { resume_to: None },
            GuardAction::RequireLogin,
        ),
        (GuardState::CheckSelfIdentity, GuardEvent::IdentityUnavailable) => (
            GuardState::Denied { resume_to: None },
            GuardAction::Alert(NETWORK_ERROR_ALERT),
        ),

        (GuardState::CheckRouteRequirement, GuardEvent::RouteInspected { requires_elevated }) => {
            if requires_elevated {
                (GuardState::EnsureToken, GuardAction::EnsureToken)
            } else {
                (GuardState::Allowed, GuardAction::Proceed)
            }
        }

        (GuardState::EnsureToken, GuardEvent::TokenChecked(check)) => match check {
            TokenCheck::Valid => (GuardState::Allowed, GuardAction::Proceed),
            TokenCheck::Missing => (GuardState::AwaitConsent, GuardAction::AskConsent),
            TokenCheck::AwaitingProvider => (GuardState::Redirecting, GuardAction::Suspend),
        },

        (GuardState::AwaitConsent, GuardEvent::ConsentAnswered { accepted: true }) => {
            (GuardState::Redirecting, GuardAction::BeginRedirect)
        }
        (GuardState::AwaitConsent, GuardEvent::ConsentAnswered { accepted: false })
        | (GuardState::Redirecting, GuardEvent::RedirectFailed) => {
            let target = decline_target(nav, safe_route);
            (
                GuardState::Denied {
                    resume_to: Some(target.clone()),
                },
                GuardAction::Resume(target),
            )
        }

        (GuardState::Redirecting, GuardEvent::RedirectIssued) => {
            (GuardState::Redirecting, GuardAction::Suspend)
        }

        (state, _) => (state, GuardAction::None),
    }
}

/// Terminal result of one guarded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Denied { resume_to: Option<String> },
    /// Suspended until the provider redirects back to the callback route.
    Redirecting,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied { .. } => "denied",
            Outcome::Redirecting => "redirecting",
        }
    }
}

/// Everything the guard consults or drives.
pub struct GuardParts {
    pub identity: Arc<SessionIdentity>,
    pub routes: Arc<RouteTable>,
    pub tokens: Arc<TokenStore>,
    pub probe: Arc<dyn IdentityProbe>,
    pub redirector: AuthorizationRedirector,
    pub flight: Arc<RedirectFlight>,
    pub consent: Arc<dyn ConsentPrompt>,
    pub login: Arc<dyn FirstPartyLogin>,
    pub alerts: Arc<dyn Alerts>,
    pub consent_message: String,
    pub safe_route: String,
}

pub struct NavigationGuard {
    parts: GuardParts,
}

impl NavigationGuard {
    pub fn new(parts: GuardParts) -> Self {
        Self { parts }
    }

    pub fn safe_route(&self) -> &str {
        &self.parts.safe_route
    }

    /// Run the guard for one navigation to completion.
    ///
    /// The caller must not run two navigations of the same tab at once.
    pub async fn navigate(&self, nav: &Navigation) -> Outcome {
        let p = &self.parts;
        let mut state = GuardState::CheckSelfIdentity;
        let mut event = self.resolve_identity().await;

        loop {
            let (next, action) = handle_event(state, event, nav, &p.safe_route);
            debug!(route = %nav.to, state = ?next, action = ?action, "guard transition");
            state = next;

            event = match action {
                GuardAction::InspectRoute => GuardEvent::RouteInspected {
                    requires_elevated: p.routes.requires_elevated(&nav.to),
                },
                GuardAction::EnsureToken => GuardEvent::TokenChecked(self.check_token().await),
                GuardAction::AskConsent => GuardEvent::ConsentAnswered {
                    accepted: p.consent.confirm(&p.consent_message).await,
                },
                GuardAction::BeginRedirect => self.begin_redirect(nav).await,
                GuardAction::RequireLogin => {
                    info!(route = %nav.to, "no first-party identity, handing off to login");
                    p.login.require_login(&nav.to);
                    break;
                }
                GuardAction::Alert(message) => {
                    p.alerts.alert(message);
                    break;
                }
                GuardAction::Resume(ref target) => {
                    info!(route = %nav.to, resume_to = %target, "elevated access declined");
                    break;
                }
                GuardAction::Proceed | GuardAction::Suspend | GuardAction::None => break,
            };
        }

        let outcome = match state {
            GuardState::Allowed => Outcome::Allowed,
            GuardState::Redirecting => Outcome::Redirecting,
            GuardState::Denied { resume_to } => Outcome::Denied { resume_to },
            other => {
                warn!(route = %nav.to, state = ?other, "guard stopped before a terminal state");
                Outcome::Denied { resume_to: None }
            }
        };
        metrics::record_guard_outcome(outcome.label());
        outcome
    }

    async fn resolve_identity(&self) -> GuardEvent {
        match self.parts.identity.resolve().await {
            IdentityStatus::Present(_) => GuardEvent::IdentityPresent,
            IdentityStatus::Absent => GuardEvent::IdentityAbsent,
            IdentityStatus::Unavailable(_) => GuardEvent::IdentityUnavailable,
        }
    }

    async fn check_token(&self) -> TokenCheck {
        let p = &self.parts;
        if p.tokens.ensure_token(p.probe.as_ref()).await {
            TokenCheck::Valid
        } else if p.flight.is_outstanding() {
            TokenCheck::AwaitingProvider
        } else {
            TokenCheck::Missing
        }
    }

    async fn begin_redirect(&self, nav: &Navigation) -> GuardEvent {
        let p = &self.parts;
        if !p.flight.try_start() {
            debug!(route = %nav.to, "redirect already outstanding for this tab");
            return GuardEvent::RedirectIssued;
        }
        match p.redirector.begin(&nav.to, nav.from.as_deref()).await {
            Ok(_) => GuardEvent::RedirectIssued,
            Err(e) => {
                p.flight.finish();
                error!(route = %nav.to, error = %e, kind = e.kind(), "redirect aborted");
                p.alerts.alert(&e.to_string());
                GuardEvent::RedirectFailed
            }
        }
    }
}
