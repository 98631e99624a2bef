//! [`HttpRepository`]: the storage traits over HTTP.

use chrono::{DateTime, Utc};
use recall_core::{
  card::{Card, CardContent},
  repository::{CardQuery, CardRepository, Page, PageRequest, RuleTableBackend},
  rules::ReviewRule,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use uuid::Uuid;

use crate::{ClientConfig, Error, Result};

const API_PREFIX: &str = "/api/v1";

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

#[derive(Deserialize)]
struct RuleList {
  items: Vec<ReviewRule>,
}

/// Async HTTP client for the Recall JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpRepository {
  client: Client,
  config: ClientConfig,
}

impl HttpRepository {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &ClientConfig { &self.config }

  fn url(&self, path: &str) -> String {
    format!("{}{API_PREFIX}{path}", self.config.base_url.trim_end_matches('/'))
  }

  /// Send a request, retrying idempotent methods per the retry policy.
  ///
  /// `build` is called once per attempt to attach query and body.
  async fn send(
    &self,
    method: Method,
    path: &str,
    card: Option<Uuid>,
    build: impl Fn(RequestBuilder) -> RequestBuilder,
  ) -> Result<Response> {
    let url = self.url(path);
    let idempotent = matches!(method, Method::GET | Method::PUT | Method::DELETE);
    let attempts = if idempotent { self.config.retry.max_attempts.max(1) } else { 1 };

    let mut attempt = 1;
    loop {
      let sent = build(self.client.request(method.clone(), &url)).send().await;
      let retryable = match &sent {
        Ok(resp) => resp.status().is_server_error(),
        Err(e) => e.is_connect() || e.is_timeout() || e.is_request(),
      };

      if retryable && attempt < attempts {
        let delay = self.config.retry.delay(attempt);
        tracing::warn!(%method, %url, attempt, ?delay, "request failed; retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
        continue;
      }

      return check(sent?, card).await;
    }
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, card: Option<Uuid>) -> Result<T> {
    Ok(self.send(Method::GET, path, card, |r| r).await?.json().await?)
  }
}

/// Turn non-2xx answers into errors.
async fn check(resp: Response, card: Option<Uuid>) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }

  let text = resp.text().await.unwrap_or_default();
  let message = serde_json::from_str::<ErrorBody>(&text)
    .map(|b| b.error)
    .unwrap_or(text);

  Err(match (status, card) {
    (StatusCode::NOT_FOUND, Some(id)) => Error::CardNotFound(id),
    (StatusCode::BAD_REQUEST, _) => Error::BadRequest(message),
    _ => Error::Status { status: status.as_u16(), message },
  })
}

fn page_query(page: PageRequest) -> [(&'static str, String); 2] {
  [("page", page.page.to_string()), ("per_page", page.per_page.to_string())]
}

// ─── CardRepository impl ─────────────────────────────────────────────────────

impl CardRepository for HttpRepository {
  type Error = Error;

  async fn list(&self, query: &CardQuery) -> Result<Page<Card>> {
    let resp = self
      .send(Method::GET, "/cards", None, |r| {
        let r = r.query(&page_query(query.page));
        match &query.search {
          Some(s) => r.query(&[("search", s)]),
          None => r,
        }
      })
      .await?;
    Ok(resp.json().await?)
  }

  async fn create(&self, content: CardContent) -> Result<Card> {
    let resp = self.send(Method::POST, "/cards", None, |r| r.json(&content)).await?;
    Ok(resp.json().await?)
  }

  async fn update(&self, id: Uuid, content: CardContent) -> Result<Card> {
    let resp = self
      .send(Method::PUT, &format!("/cards/{id}"), Some(id), |r| r.json(&content))
      .await?;
    Ok(resp.json().await?)
  }

  async fn delete(&self, id: Uuid) -> Result<()> {
    self.send(Method::DELETE, &format!("/cards/{id}"), Some(id), |r| r).await?;
    Ok(())
  }

  async fn get(&self, id: Uuid) -> Result<Option<Card>> {
    match self.get_json(&format!("/cards/{id}"), Some(id)).await {
      Ok(card) => Ok(Some(card)),
      Err(Error::CardNotFound(_)) => Ok(None),
      Err(e) => Err(e),
    }
  }

  async fn fetch_due(&self, page: PageRequest) -> Result<Page<Card>> {
    let resp = self
      .send(Method::GET, "/cards/review", None, |r| r.query(&page_query(page)))
      .await?;
    Ok(resp.json().await?)
  }

  async fn set_next_review(&self, id: Uuid, at: DateTime<Utc>) -> Result<Card> {
    let body = json!({ "next_review_at": at });
    let resp = self
      .send(Method::PUT, &format!("/cards/{id}/next-review"), Some(id), |r| r.json(&body))
      .await?;
    Ok(resp.json().await?)
  }

  async fn apply_outcome(&self, id: Uuid, remembered: bool) -> Result<Card> {
    let body = json!({ "remembered": remembered });
    let resp = self
      .send(Method::POST, &format!("/cards/{id}/review"), Some(id), |r| r.json(&body))
      .await?;
    Ok(resp.json().await?)
  }
}

// ─── RuleTableBackend impl ───────────────────────────────────────────────────

impl RuleTableBackend for HttpRepository {
  type Error = Error;

  async fn get_rules(&self) -> Result<Vec<ReviewRule>> {
    Ok(self.get_json::<RuleList>("/review-rules", None).await?.items)
  }

  async fn replace_rules(&self, rules: Vec<ReviewRule>) -> Result<Vec<ReviewRule>> {
    let body = json!({ "rules": rules });
    let resp = self.send(Method::PUT, "/review-rules", None, |r| r.json(&body)).await?;
    Ok(resp.json::<RuleList>().await?.items)
  }

  async fn reset_rules(&self) -> Result<Vec<ReviewRule>> {
    let resp = self.send(Method::POST, "/review-rules/reset", None, |r| r).await?;
    Ok(resp.json::<RuleList>().await?.items)
  }
}
