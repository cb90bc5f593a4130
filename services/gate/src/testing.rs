//! Tab wired to real host adapters against a mock backend

use std::sync::Arc;

use auth_flow::{Collaborators, PendingAuthStore, RouteRule, RouteTable, Tab, TabSettings, TokenStore};
use host::{ConsoleAlerts, ConsoleLogin, ConsoleNavigator, HttpIdentityCheck, TokenProbe};
use pkce_auth::OAuthConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::shell::{LineInput, TerminalConsent};

/// First-party backend that knows "alice".
pub async fn identity_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"traqID": "alice"})))
        .mount(&server)
        .await;
    server
}

/// `/results/:id` is elevated; consent answers come from `consent_input`.
pub fn test_tab(server: &MockServer, consent_input: &'static [u8]) -> Arc<Tab> {
    tab_reading(
        server,
        vec![elevated("/results/:id")],
        Arc::new(LineInput::new(consent_input)),
    )
}

pub fn elevated(path: &str) -> RouteRule {
    RouteRule {
        path: path.into(),
        requires_elevated: true,
    }
}

/// Tab whose consent prompt reads from `input`, as in the binary.
pub fn tab_reading(server: &MockServer, rules: Vec<RouteRule>, input: Arc<LineInput>) -> Arc<Tab> {
    let http = reqwest::Client::new();
    let settings = TabSettings {
        name: "tab-test".into(),
        oauth: OAuthConfig {
            token_endpoint: format!("{}/oauth2/token", server.uri()),
            ..OAuthConfig::default()
        }
        .with_client_id("client-abc"),
        routes: RouteTable::new(rules, "/callback"),
        safe_route: "/".into(),
        consent_message: "allow?".into(),
    };
    let host = Collaborators {
        identity: Arc::new(HttpIdentityCheck::new(
            http.clone(),
            format!("{}/api/users/me", server.uri()),
            None,
        )),
        probe: Arc::new(TokenProbe::new(http.clone(), server.uri())),
        navigator: Arc::new(ConsoleNavigator),
        consent: Arc::new(TerminalConsent::new(input)),
        login: Arc::new(ConsoleLogin::new(None)),
        alerts: Arc::new(ConsoleAlerts),
    };
    Arc::new(Tab::new(
        settings,
        PendingAuthStore::in_process(),
        Arc::new(TokenStore::volatile()),
        http,
        host,
    ))
}
