use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::session::Session;

/// Agency REST API client.
///
/// Attaches the session's bearer token to every request. A 401 response
/// clears the session before the error is returned.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  session: Session,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, session: Session) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base: api_base(&config.url)?,
      session,
    })
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  /// Base URL every path is resolved against (`<url>/api/`).
  pub fn base_url(&self) -> &Url {
    &self.base
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
    let response = self.execute::<(), ()>(Method::GET, path, None, None).await?;
    decode(response).await
  }

  /// GET with query parameters. Unset filter fields are not sent.
  pub async fn get_with<T, Q>(&self, path: &str, query: &Q) -> ApiResult<T>
  where
    T: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    let response = self
      .execute::<Q, ()>(Method::GET, path, Some(query), None)
      .await?;
    decode(response).await
  }

  pub async fn post<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let response = self
      .execute::<(), B>(Method::POST, path, None, Some(body))
      .await?;
    decode(response).await
  }

  /// POST without a body (action endpoints such as convert).
  pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
    let response = self.execute::<(), ()>(Method::POST, path, None, None).await?;
    decode(response).await
  }

  pub async fn put<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let response = self
      .execute::<(), B>(Method::PUT, path, None, Some(body))
      .await?;
    decode(response).await
  }

  /// PUT whose arguments travel in the query string.
  pub async fn put_query<T, Q>(&self, path: &str, query: &Q) -> ApiResult<T>
  where
    T: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    let response = self
      .execute::<Q, ()>(Method::PUT, path, Some(query), None)
      .await?;
    decode(response).await
  }

  pub async fn delete(&self, path: &str) -> ApiResult<()> {
    self
      .execute::<(), ()>(Method::DELETE, path, None, None)
      .await?;
    Ok(())
  }

  async fn execute<Q, B>(
    &self,
    method: Method,
    path: &str,
    query: Option<&Q>,
    body: Option<&B>,
  ) -> ApiResult<reqwest::Response>
  where
    Q: Serialize + ?Sized,
    B: Serialize + ?Sized,
  {
    let url = self
      .base
      .join(path.trim_start_matches('/'))
      .map_err(|e| ApiError::Network(format!("invalid request path {}: {}", path, e)))?;

    let mut request = self.http.request(method.clone(), url);
    if let Some(token) = self.session.token() {
      request = request.bearer_auth(token);
    }
    if let Some(query) = query {
      request = request.query(query);
    }
    if let Some(body) = body {
      request = request.json(body);
    }

    debug!(%method, path, "sending request");
    let response = request.send().await.map_err(|e| {
      warn!(%method, path, error = %e, "request failed to complete");
      ApiError::from(e)
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let error = ApiError::from_response(status.as_u16(), &text);
    if error.is_auth() {
      warn!(%method, path, "session rejected by server, logging out");
      if let Err(e) = self.session.clear() {
        warn!(error = %e, "failed to clear stored session");
      }
    } else {
      warn!(%method, path, status = status.as_u16(), error = %error, "request rejected");
    }
    Err(error)
  }
}

impl std::fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiClient")
      .field("base", &self.base.as_str())
      .field("authenticated", &self.session.is_authenticated())
      .finish_non_exhaustive()
  }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
  let bytes = response.bytes().await?;
  serde_json::from_slice(&bytes).map_err(ApiError::decode)
}

fn api_base(url: &str) -> Result<Url> {
  let base = format!("{}/api/", url.trim_end_matches('/'));
  Url::parse(&base).map_err(|e| eyre!("Invalid API url {}: {}", url, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{json, Value};
  use wiremock::matchers::{body_json, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(server: &MockServer, session: Session) -> ApiClient {
    let config = ApiConfig {
      url: server.uri(),
      timeout_secs: 5,
    };
    ApiClient::new(&config, session).unwrap()
  }

  #[test]
  fn test_api_base_normalizes_trailing_slash() {
    assert_eq!(api_base("http://localhost:8000").unwrap().as_str(), "http://localhost:8000/api/");
    assert_eq!(api_base("http://localhost:8000/").unwrap().as_str(), "http://localhost:8000/api/");
    assert!(api_base("not a url").is_err());
  }

  #[tokio::test]
  async fn test_bearer_token_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/dashboard"))
      .and(header("authorization", "Bearer tok-123"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
      .expect(1)
      .mount(&server)
      .await;

    let api = client(&server, Session::with_token("tok-123"));
    let body: Value = api.get("dashboard").await.unwrap();
    assert_eq!(body, json!({"ok": true}));
  }

  #[tokio::test]
  async fn test_query_and_body_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/accounts"))
      .and(query_param("search", "ab"))
      .and(query_param("page_size", "5"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [], "total": 0})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/api/notes"))
      .and(body_json(json!({"content": "hi"})))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "N1"})))
      .expect(1)
      .mount(&server)
      .await;

    let api = client(&server, Session::in_memory());
    let _: Value = api
      .get_with("accounts", &json!({"search": "ab", "page_size": 5}))
      .await
      .unwrap();
    let created: Value = api.post("notes", &json!({"content": "hi"})).await.unwrap();
    assert_eq!(created["id"], "N1");
  }

  #[tokio::test]
  async fn test_unauthorized_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/auth/me"))
      .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid token"})))
      .mount(&server)
      .await;

    let session = Session::with_token("expired");
    let api = client(&server, session.clone());
    let result: ApiResult<Value> = api.get("auth/me").await;

    assert_eq!(result.unwrap_err(), ApiError::Auth);
    assert!(session.token().is_none());
  }

  #[tokio::test]
  async fn test_validation_detail_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/policies"))
      .respond_with(ResponseTemplate::new(422).set_body_json(json!({
        "detail": [{"loc": ["body", "effective_date"], "msg": "field required", "type": "missing"}]
      })))
      .mount(&server)
      .await;

    let api = client(&server, Session::in_memory());
    let error = api.post::<Value, _>("policies", &json!({})).await.unwrap_err();

    assert_eq!(error.status(), Some(422));
    assert_eq!(error.field_errors()[0].field, "body.effective_date");
    assert!(!error.is_retryable());
  }

  #[tokio::test]
  async fn test_server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/carriers"))
      .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
      .mount(&server)
      .await;

    let api = client(&server, Session::in_memory());
    let error = api.get::<Value>("carriers").await.unwrap_err();

    assert!(matches!(error, ApiError::Server { status: 503, .. }));
    assert!(error.is_retryable());
  }

  #[tokio::test]
  async fn test_malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/dashboard"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
      .mount(&server)
      .await;

    let api = client(&server, Session::in_memory());
    let error = api.get::<Value>("dashboard").await.unwrap_err();
    assert!(matches!(error, ApiError::Decode(_)));
  }

  #[tokio::test]
  async fn test_unreachable_server_is_a_network_error() {
    let server = MockServer::start().await;
    let api = client(&server, Session::in_memory());
    drop(server);

    let error = api.get::<Value>("dashboard").await.unwrap_err();
    assert!(matches!(error, ApiError::Network(_)));
  }
}
