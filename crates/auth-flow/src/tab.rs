//! One tab: the unit that owns navigation
//!
//! Navigations of a tab are serialised by the navigation lock, so guard
//! runs never interleave. The current route is published separately and can
//! be read while a navigation is parked on a consent prompt. Resumptions handed back by the
//! guard (decline) or the callback handler (provider redirect-back) are
//! followed here as fresh navigations. The callback route itself never goes
//! through the guard.

use std::sync::Arc;

use host::{
    Alerts, ConsentPrompt, FirstPartyLogin, Identity, IdentityCheck, IdentityProbe,
    NETWORK_ERROR_ALERT, Navigator,
};
use pkce_auth::OAuthConfig;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::callback::{CallbackHandler, CallbackQuery, CallbackResult};
use crate::error::Error;
use crate::flight::RedirectFlight;
use crate::guard::{GuardParts, Navigation, NavigationGuard, Outcome};
use crate::identity::SessionIdentity;
use crate::pending::{PendingAuthStore, PendingNavigation};
use crate::redirector::AuthorizationRedirector;
use crate::routes::{RouteTable, route_path};
use crate::token_store::{TokenStatus, TokenStore};

/// Upper bound on resumptions followed for one user navigation.
pub const MAX_RESUMPTIONS: usize = 8;

pub struct TabSettings {
    pub name: String,
    pub oauth: OAuthConfig,
    pub routes: RouteTable,
    pub safe_route: String,
    pub consent_message: String,
}

/// Host-side implementations the tab is wired to.
pub struct Collaborators {
    pub identity: Arc<dyn IdentityCheck>,
    pub probe: Arc<dyn IdentityProbe>,
    pub navigator: Arc<dyn Navigator>,
    pub consent: Arc<dyn ConsentPrompt>,
    pub login: Arc<dyn FirstPartyLogin>,
    pub alerts: Arc<dyn Alerts>,
}

/// Where a navigation ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    /// The route is entered and becomes current.
    View(String),
    /// Control left for the provider.
    External,
    /// Nothing entered; the current route stays.
    Blocked,
}

#[derive(Debug, Clone)]
pub struct TabStatus {
    pub tab: String,
    pub current: Option<String>,
    pub identity: Option<Identity>,
    pub token: TokenStatus,
    pub redirect_outstanding: bool,
    pub pending: PendingNavigation,
}

pub struct Tab {
    name: String,
    guard: NavigationGuard,
    callback: CallbackHandler,
    routes: Arc<RouteTable>,
    identity: Arc<SessionIdentity>,
    tokens: Arc<TokenStore>,
    pending: Arc<PendingAuthStore>,
    flight: Arc<RedirectFlight>,
    probe: Arc<dyn IdentityProbe>,
    alerts: Arc<dyn Alerts>,
    navigation: Mutex<()>,
    current: watch::Sender<Option<String>>,
}

impl Tab {
    pub fn new(
        settings: TabSettings,
        pending: PendingAuthStore,
        tokens: Arc<TokenStore>,
        http: reqwest::Client,
        host: Collaborators,
    ) -> Self {
        let pending = Arc::new(pending);
        let flight = Arc::new(RedirectFlight::new());
        let routes = Arc::new(settings.routes);
        let identity = Arc::new(SessionIdentity::new(host.identity));

        let callback = CallbackHandler::new(
            http,
            settings.oauth.clone(),
            pending.clone(),
            tokens.clone(),
            flight.clone(),
            settings.safe_route.clone(),
        );
        let guard = NavigationGuard::new(GuardParts {
            identity: identity.clone(),
            routes: routes.clone(),
            tokens: tokens.clone(),
            probe: host.probe.clone(),
            redirector: AuthorizationRedirector::new(settings.oauth, pending.clone(), host.navigator),
            flight: flight.clone(),
            consent: host.consent,
            login: host.login,
            alerts: host.alerts.clone(),
            consent_message: settings.consent_message,
            safe_route: settings.safe_route,
        });

        Self {
            name: settings.name,
            guard,
            callback,
            routes,
            identity,
            tokens,
            pending,
            flight,
            probe: host.probe,
            alerts: host.alerts,
            navigation: Mutex::new(()),
            current: watch::channel(None).0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn callback_path(&self) -> &str {
        self.routes.callback_path()
    }

    /// Navigate to `route`, following any resumptions.
    pub async fn navigate(&self, route: &str) -> Landing {
        let _navigating = self.navigation.lock().await;
        self.follow(route.to_string()).await
    }

    /// Deliver a provider redirect-back that arrived out of band (the
    /// loopback listener) to this tab.
    pub async fn complete_callback(&self, query: &CallbackQuery) -> Landing {
        let _navigating = self.navigation.lock().await;
        let resume_to = self.run_callback(query).await;
        self.follow(resume_to).await
    }

    async fn follow(&self, mut target: String) -> Landing {
        for _ in 0..=MAX_RESUMPTIONS {
            if self.routes.is_callback(&target) {
                target = self.run_callback(&CallbackQuery::from_route(&target)).await;
                continue;
            }

            let nav = Navigation::new(target.clone(), self.current_route());
            match self.guard.navigate(&nav).await {
                Outcome::Allowed => {
                    self.current.send_replace(Some(target.clone()));
                    return Landing::View(target);
                }
                Outcome::Redirecting => return Landing::External,
                Outcome::Denied {
                    resume_to: Some(next),
                } if route_path(&next) != route_path(&target) => target = next,
                Outcome::Denied { .. } => return Landing::Blocked,
            }
        }
        warn!(tab = %self.name, route = %target, "too many resumptions, stopping");
        Landing::Blocked
    }

    async fn run_callback(&self, query: &CallbackQuery) -> String {
        let outcome = self.callback.handle(query).await;
        if let CallbackResult::Rejected(Error::Network(_)) = outcome.result {
            self.alerts.alert(NETWORK_ERROR_ALERT);
        }
        outcome.resume_to
    }

    /// Re-assert the elevated token with the provider, even if it was
    /// already ensured this session.
    pub async fn verify(&self) -> bool {
        self.tokens.revalidate(self.probe.as_ref()).await
    }

    /// Drop the first-party identity and the elevated token.
    pub async fn logout(&self) {
        self.identity.logout().await;
        if let Err(e) = self.tokens.invalidate().await {
            warn!(error = %e, "failed to remove stored access token");
        }
        info!(tab = %self.name, "logged out");
    }

    /// Close the tab: tab-scoped storage does not outlive it.
    pub async fn close(&self) {
        if let Err(e) = self.pending.clear_all().await {
            warn!(error = %e, "failed to discard tab storage");
        }
        self.flight.finish();
        info!(tab = %self.name, "tab closed");
    }

    pub async fn status(&self) -> TabStatus {
        TabStatus {
            tab: self.name.clone(),
            current: self.current_route(),
            identity: self.identity.current().await,
            token: self.tokens.status().await,
            redirect_outstanding: self.flight.is_outstanding(),
            pending: self.pending.pending().await,
        }
    }

    /// Last route entered. Does not wait for a navigation in progress.
    pub fn current_route(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    pub fn redirect_outstanding(&self) -> bool {
        self.flight.is_outstanding()
    }

    pub fn safe_route(&self) -> &str {
        self.guard.safe_route()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::routes::RouteRule;
    use crate::test_support::{
        CountingProbe, RecordingAlerts, RecordingLogin, RecordingNavigator, ScriptedConsent,
        StubIdentity,
    };

    struct Fixture {
        tab: Tab,
        navigator: Arc<RecordingNavigator>,
        tokens: Arc<TokenStore>,
    }

    fn rule(path: &str) -> RouteRule {
        RouteRule {
            path: path.into(),
            requires_elevated: true,
        }
    }

    fn fixture(token_endpoint: String, answers: &[bool]) -> Fixture {
        fixture_with_rules(token_endpoint, answers, vec![rule("/results/:id")])
    }

    fn fixture_with_rules(token_endpoint: String, answers: &[bool], rules: Vec<RouteRule>) -> Fixture {
        let navigator = Arc::new(RecordingNavigator::default());
        let tokens = Arc::new(TokenStore::volatile());
        let settings = TabSettings {
            name: "tab-test".into(),
            oauth: OAuthConfig {
                token_endpoint,
                ..OAuthConfig::default()
            }
            .with_client_id("client-abc"),
            routes: RouteTable::new(rules, "/callback"),
            safe_route: "/".into(),
            consent_message: "elevated access needed".into(),
        };
        let host = Collaborators {
            identity: Arc::new(StubIdentity::present("alice")),
            probe: Arc::new(CountingProbe::accepting()),
            navigator: navigator.clone(),
            consent: Arc::new(ScriptedConsent::answering(answers)),
            login: Arc::new(RecordingLogin::default()),
            alerts: Arc::new(RecordingAlerts::default()),
        };
        let tab = Tab::new(
            settings,
            PendingAuthStore::in_process(),
            tokens.clone(),
            reqwest::Client::new(),
            host,
        );
        Fixture {
            tab,
            navigator,
            tokens,
        }
    }

    fn state_of(navigator: &RecordingNavigator) -> String {
        let urls = navigator.urls();
        let query: HashMap<String, String> = urls[0].query_pairs().into_owned().collect();
        query["state"].clone()
    }

    #[tokio::test]
    async fn full_round_trip_lands_on_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "T1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        let f = fixture(format!("{}/token", server.uri()), &[true]);

        assert_eq!(f.tab.navigate("/list").await, Landing::View("/list".into()));
        assert_eq!(f.tab.navigate("/results/1").await, Landing::External);
        assert!(f.tab.status().await.redirect_outstanding);

        let state = state_of(&f.navigator);
        let landing = f
            .tab
            .complete_callback(&CallbackQuery {
                code: Some("abc".into()),
                state: Some(state),
            })
            .await;

        assert_eq!(landing, Landing::View("/results/1".into()));
        let status = f.tab.status().await;
        assert_eq!(status.current.as_deref(), Some("/results/1"));
        assert!(status.token.present && status.token.ensured);
        assert!(!status.redirect_outstanding);
        assert_eq!(status.pending, PendingNavigation::default());
    }

    #[tokio::test]
    async fn callback_route_typed_as_navigation_bypasses_guard() {
        let f = fixture("http://127.0.0.1:9/token".into(), &[]);
        f.tab.navigate("/list").await;

        let landing = f.tab.navigate("/callback?code=abc&state=forged").await;

        assert_eq!(landing, Landing::View("/".into()));
        assert!(f.tokens.access_token().await.is_none());
    }

    #[tokio::test]
    async fn decline_resumes_to_previous_route() {
        let f = fixture("http://127.0.0.1:9/token".into(), &[false]);
        f.tab.navigate("/list").await;

        assert_eq!(f.tab.navigate("/results/1").await, Landing::View("/list".into()));
        assert!(f.navigator.urls().is_empty());
    }

    #[tokio::test]
    async fn decline_on_first_navigation_lands_on_safe_route() {
        let f = fixture("http://127.0.0.1:9/token".into(), &[false]);
        assert_eq!(f.tab.navigate("/results/1").await, Landing::View("/".into()));
    }

    #[tokio::test]
    async fn declined_safe_route_is_blocked_not_looped() {
        let f = fixture_with_rules(
            "http://127.0.0.1:9/token".into(),
            &[false, false],
            vec![rule("/*")],
        );

        assert_eq!(f.tab.navigate("/").await, Landing::Blocked);
        assert_eq!(f.tab.status().await.current, None);
    }

    #[tokio::test]
    async fn close_discards_pending_flow() {
        let f = fixture("http://127.0.0.1:9/token".into(), &[true]);
        assert_eq!(f.tab.navigate("/results/1").await, Landing::External);

        f.tab.close().await;

        let status = f.tab.status().await;
        assert_eq!(status.pending, PendingNavigation::default());
        assert!(!status.redirect_outstanding);
    }

    #[tokio::test]
    async fn logout_drops_token() {
        let f = fixture("http://127.0.0.1:9/token".into(), &[]);
        f.tokens.set_token(common::Secret::from("T1")).await.unwrap();
        f.tab.navigate("/list").await;
        assert!(f.tab.status().await.identity.is_some());

        f.tab.logout().await;

        let status = f.tab.status().await;
        assert!(status.identity.is_none());
        assert!(!status.token.present);
    }
}
