//! JSON REST API for Recall.
//!
//! Exposes an axum [`Router`] backed by any store implementing
//! [`CardRepository`] and [`RuleTableBackend`]. Scheduling happens in the
//! store, so a client's local prediction can be checked against the result.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1", recall_api::api_router(store.clone()))
//! ```

pub mod cards;
pub mod error;
pub mod rules;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use recall_core::repository::{CardRepository, RuleTableBackend};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: CardRepository + RuleTableBackend + 'static,
{
  Router::new()
    // Cards
    .route("/cards", get(cards::list::<S>).post(cards::create::<S>))
    .route("/cards/review", get(cards::due::<S>))
    .route(
      "/cards/{id}",
      get(cards::get_one::<S>).put(cards::update::<S>).delete(cards::delete_one::<S>),
    )
    .route("/cards/{id}/next-review", put(cards::set_next_review::<S>))
    .route("/cards/{id}/review", post(cards::review::<S>))
    // Rules
    .route("/review-rules", get(rules::list::<S>).put(rules::replace::<S>))
    .route("/review-rules/reset", post(rules::reset::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use recall_core::card::Card;
  use recall_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(Arc::new(store))
  }

  async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header("content-type", "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
  }

  async fn create(app: &Router, question: &str) -> Card {
    let (status, body) =
      send(app, "POST", "/cards", Some(json!({ "question": question, "answer": "a" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    serde_json::from_value(body).unwrap()
  }

  #[tokio::test]
  async fn create_get_update_delete() {
    let app = app().await;
    let card = create(&app, "capital of Peru").await;

    let (status, body) = send(&app, "GET", &format!("/cards/{}", card.card_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question"], "capital of Peru");

    let (status, body) = send(
      &app,
      "PUT",
      &format!("/cards/{}", card.card_id),
      Some(json!({ "question": "capital of Peru?", "answer": "Lima" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Lima");

    let (status, _) = send(&app, "DELETE", &format!("/cards/{}", card.card_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/cards/{}", card.card_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
  }

  #[tokio::test]
  async fn list_searches_and_paginates() {
    let app = app().await;
    for q in ["river Nile", "river Amazon", "mount Everest"] {
      create(&app, q).await;
    }

    let (status, body) = send(&app, "GET", "/cards?search=river&per_page=1&page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["question"], "river Amazon");
  }

  #[tokio::test]
  async fn review_and_reschedule() {
    let app = app().await;
    let card = create(&app, "q").await;

    let (status, body) = send(
      &app,
      "POST",
      &format!("/cards/{}/review", card.card_id),
      Some(json!({ "remembered": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review_count"], 1);

    let (status, _) = send(
      &app,
      "PUT",
      &format!("/cards/{}/next-review", card.card_id),
      Some(json!({ "next_review_at": "2000-01-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
      &app,
      "PUT",
      &format!("/cards/{}/next-review", card.card_id),
      Some(json!({ "next_review_at": "2999-01-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review_count"], 1);
  }

  #[tokio::test]
  async fn review_of_unknown_card_is_404() {
    let app = app().await;
    let (status, _) = send(
      &app,
      "POST",
      &format!("/cards/{}/review", Uuid::new_v4()),
      Some(json!({ "remembered": false })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn due_list_excludes_future_cards() {
    let app = app().await;
    let card = create(&app, "q").await;
    send(
      &app,
      "PUT",
      &format!("/cards/{}/next-review", card.card_id),
      Some(json!({ "next_review_at": card.created_at })),
    )
    .await;
    create(&app, "not yet").await;

    let (status, body) = send(&app, "GET", "/cards/review", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["card_id"], card.card_id.to_string());
  }

  #[tokio::test]
  async fn rules_replace_validate_and_reset() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/review-rules", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 6);

    let (status, body) = send(
      &app,
      "PUT",
      "/review-rules",
      Some(json!({ "rules": [{ "review_count": 0, "interval_days": 2 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([{ "review_count": 0, "interval_days": 2 }]));

    let (status, _) = send(
      &app,
      "PUT",
      "/review-rules",
      Some(json!({ "rules": [{ "review_count": 0, "interval_days": -1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/review-rules/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 6);
  }

  #[tokio::test]
  async fn oversized_interval_is_rejected_and_reviews_still_work() {
    let app = app().await;
    let card = create(&app, "q").await;

    let (status, body) = send(
      &app,
      "PUT",
      "/review-rules",
      Some(json!({ "rules": [{ "review_count": 0, "interval_days": 100_000_000 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at most"));

    let (status, body) = send(
      &app,
      "POST",
      &format!("/cards/{}/review", card.card_id),
      Some(json!({ "remembered": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review_count"], 1);
  }

  #[test]
  fn conflict_maps_to_409() {
    use axum::response::IntoResponse as _;
    use chrono::Utc;
    use recall_core::card::CardContent;

    let local = Card::new(Uuid::new_v4(), CardContent::new("q", "a"), Utc::now());
    let remote = Card { review_count: 3, ..local.clone() };
    let err = recall_core::Error::Conflict { local: Box::new(local), remote: Box::new(remote) };
    let resp = ApiError::from(err).into_response();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }
}
