//! HTTP implementations of the identity seams
//!
//! Two different backends are involved:
//! - the first-party backend answers "who is logged in here" from its own
//!   session cookie (`HttpIdentityCheck`)
//! - the provider answers "is this bearer token still good"
//!   (`ProviderApi` / `TokenProbe`)
//!
//! A `ProviderApi` is bound to exactly one token. Callers build a new one
//! whenever the token changes instead of keeping a shared client around.

use common::Secret;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::{BoxFuture, HostError, Identity, IdentityCheck, IdentityProbe, Result};

#[derive(Deserialize)]
struct WhoAmI {
    #[serde(rename = "traqID", default)]
    traq_id: Option<String>,
}

/// `GET <endpoint>` against the first-party backend.
pub struct HttpIdentityCheck {
    client: reqwest::Client,
    endpoint: String,
    session_cookie: Option<Secret<String>>,
}

impl HttpIdentityCheck {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        session_cookie: Option<Secret<String>>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            session_cookie,
        }
    }

    async fn who_am_i(&self) -> Result<Option<Identity>> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(cookie) = &self.session_cookie {
            request = request.header(reqwest::header::COOKIE, cookie.expose().as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| HostError::Network(format!("identity check failed: {e}")))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            debug!(%status, "identity endpoint reports no session");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(HostError::Rejected(format!(
                "identity endpoint returned {status}"
            )));
        }

        let body = response
            .json::<Option<WhoAmI>>()
            .await
            .map_err(|e| HostError::Decode(format!("identity response: {e}")))?;

        Ok(body
            .and_then(|who| who.traq_id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(|user_id| Identity { user_id }))
    }
}

impl IdentityCheck for HttpIdentityCheck {
    fn check(&self) -> BoxFuture<'_, Result<Option<Identity>>> {
        Box::pin(self.who_am_i())
    }
}

/// The provider's view of the token holder.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Provider API client bound to one access token.
pub struct ProviderApi {
    client: reqwest::Client,
    api_base: String,
    token: Secret<String>,
}

impl ProviderApi {
    pub fn bind(client: reqwest::Client, api_base: &str, token: Secret<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// `GET {api_base}/users/me` with the bound token.
    pub async fn me(&self) -> Result<ProviderUser> {
        let response = self
            .client
            .get(format!("{}/users/me", self.api_base))
            .bearer_auth(self.token.expose())
            .send()
            .await
            .map_err(|e| HostError::Network(format!("provider request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HostError::Rejected(format!("provider returned {status}")));
        }

        response
            .json::<ProviderUser>()
            .await
            .map_err(|e| HostError::Decode(format!("provider user: {e}")))
    }
}

/// Asserts a token by fetching the provider's current user with it.
pub struct TokenProbe {
    client: reqwest::Client,
    api_base: String,
}

impl TokenProbe {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }
}

impl IdentityProbe for TokenProbe {
    fn probe<'a>(&'a self, token: &'a Secret<String>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let api = ProviderApi::bind(self.client.clone(), &self.api_base, token.clone());
            let user = api.me().await?;
            debug!(provider_user = %user.name, "token accepted by provider");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn identity_server(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn checker(server: &MockServer, cookie: Option<&str>) -> HttpIdentityCheck {
        HttpIdentityCheck::new(
            reqwest::Client::new(),
            format!("{}/api/users/me", server.uri()),
            cookie.map(Secret::from),
        )
    }

    #[tokio::test]
    async fn identity_present() {
        let server = identity_server(200, serde_json::json!({"traqID": "mds_boy"})).await;
        let identity = checker(&server, None).check().await.unwrap();
        assert_eq!(
            identity,
            Some(Identity {
                user_id: "mds_boy".into()
            })
        );
    }

    #[tokio::test]
    async fn null_body_is_none_marker() {
        let server = identity_server(200, serde_json::Value::Null).await;
        assert_eq!(checker(&server, None).check().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_id_is_none_marker() {
        let server = identity_server(200, serde_json::json!({"traqID": ""})).await;
        assert_eq!(checker(&server, None).check().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unauthorized_is_none_marker() {
        let server = identity_server(401, serde_json::json!({"message": "no session"})).await;
        assert_eq!(checker(&server, None).check().await.unwrap(), None);
    }

    #[tokio::test]
    async fn server_error_is_rejected() {
        let server = identity_server(503, serde_json::json!({})).await;
        let err = checker(&server, None).check().await.unwrap_err();
        assert!(matches!(err, HostError::Rejected(_)));
    }

    #[tokio::test]
    async fn session_cookie_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("cookie", "session=abc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"traqID": "u1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let identity = checker(&server, Some("session=abc")).check().await.unwrap();
        assert_eq!(identity.unwrap().user_id, "u1");
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let check = HttpIdentityCheck::new(reqwest::Client::new(), "http://127.0.0.1:9/me", None);
        assert!(matches!(
            check.check().await.unwrap_err(),
            HostError::Network(_)
        ));
    }

    #[tokio::test]
    async fn probe_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/users/me"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "uuid-1", "name": "mds_boy"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let probe = TokenProbe::new(reqwest::Client::new(), format!("{}/api/v3/", server.uri()));
        probe.probe(&Secret::from("T1")).await.unwrap();
    }

    #[tokio::test]
    async fn probe_fails_on_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let probe = TokenProbe::new(reqwest::Client::new(), server.uri());
        let err = probe.probe(&Secret::from("expired")).await.unwrap_err();
        assert!(matches!(err, HostError::Rejected(_)));
    }

    #[tokio::test]
    async fn provider_api_returns_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "uuid-2", "name": "someone"})),
            )
            .mount(&server)
            .await;

        let api = ProviderApi::bind(reqwest::Client::new(), &server.uri(), Secret::from("T2"));
        let user = api.me().await.unwrap();
        assert_eq!(user.id, "uuid-2");
        assert_eq!(user.name, "someone");
    }
}
