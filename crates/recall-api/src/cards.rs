//! Handlers for `/cards` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/cards` | Optional `page`, `per_page`, `search` |
//! | `POST`   | `/cards` | Body: `{"question":"..","answer":".."}`; returns 201 |
//! | `GET`    | `/cards/review` | Cards due now; optional `page`, `per_page` |
//! | `GET`    | `/cards/{id}` | 404 if not found |
//! | `PUT`    | `/cards/{id}` | Body as for `POST` |
//! | `DELETE` | `/cards/{id}` | 204 |
//! | `PUT`    | `/cards/{id}/next-review` | Body: `{"next_review_at":"<RFC 3339>"}` |
//! | `POST`   | `/cards/{id}/review` | Body: `{"remembered":true}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use recall_core::{
  card::{Card, CardContent},
  repository::{CardQuery, CardRepository, DEFAULT_PAGE_SIZE, Page, PageRequest},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Largest page a client may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub page:     Option<u32>,
  pub per_page: Option<u32>,
  pub search:   Option<String>,
}

impl ListParams {
  fn page_request(&self) -> PageRequest {
    PageRequest::new(
      self.page.unwrap_or(1),
      self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
    )
  }
}

/// `GET /cards[?page=..&per_page=..&search=..]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Card>>, ApiError>
where
  S: CardRepository,
{
  let query = CardQuery { page: params.page_request(), search: params.search };
  let page = store.list(&query).await.map_err(ApiError::from_store)?;
  Ok(Json(page))
}

/// `GET /cards/review[?page=..&per_page=..]`
pub async fn due<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Card>>, ApiError>
where
  S: CardRepository,
{
  let page = store
    .fetch_due(params.page_request())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(page))
}

// ─── Create / read / update / delete ─────────────────────────────────────────

/// `POST /cards`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CardContent>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CardRepository,
{
  let card = store.create(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(card)))
}

/// `GET /cards/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Card>, ApiError>
where
  S: CardRepository,
{
  let card = store
    .get(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("card {id} not found")))?;
  Ok(Json(card))
}

/// `PUT /cards/{id}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CardContent>,
) -> Result<Json<Card>, ApiError>
where
  S: CardRepository,
{
  let card = store.update(id, body).await.map_err(ApiError::from_store)?;
  Ok(Json(card))
}

/// `DELETE /cards/{id}`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: CardRepository,
{
  store.delete(id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Scheduling ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NextReviewBody {
  pub next_review_at: DateTime<Utc>,
}

/// `PUT /cards/{id}/next-review`
pub async fn set_next_review<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NextReviewBody>,
) -> Result<Json<Card>, ApiError>
where
  S: CardRepository,
{
  let card = store
    .set_next_review(id, body.next_review_at)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(card))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
  pub remembered: bool,
}

/// `POST /cards/{id}/review`
pub async fn review<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<Card>, ApiError>
where
  S: CardRepository,
{
  let card = store
    .apply_outcome(id, body.remembered)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(card))
}
