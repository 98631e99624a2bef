//! Handlers for `/review-rules` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/review-rules` | `{"items":[{"review_count":0,"interval_days":1},..]}` |
//! | `PUT`  | `/review-rules` | Body: `{"rules":[..]}`; replaces the whole table, 400 if invalid |
//! | `POST` | `/review-rules/reset` | Restores the built-in table |

use std::sync::Arc;

use axum::{Json, extract::State};
use recall_core::{repository::RuleTableBackend, rules::ReviewRule};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct RuleList {
  pub items: Vec<ReviewRule>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplaceBody {
  pub rules: Vec<ReviewRule>,
}

/// `GET /review-rules`
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<Json<RuleList>, ApiError>
where
  S: RuleTableBackend,
{
  let items = store.get_rules().await.map_err(ApiError::from_store)?;
  Ok(Json(RuleList { items }))
}

/// `PUT /review-rules`
pub async fn replace<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<ReplaceBody>,
) -> Result<Json<RuleList>, ApiError>
where
  S: RuleTableBackend,
{
  let items = store.replace_rules(body.rules).await.map_err(ApiError::from_store)?;
  Ok(Json(RuleList { items }))
}

/// `POST /review-rules/reset`
pub async fn reset<S>(State(store): State<Arc<S>>) -> Result<Json<RuleList>, ApiError>
where
  S: RuleTableBackend,
{
  let items = store.reset_rules().await.map_err(ApiError::from_store)?;
  Ok(Json(RuleList { items }))
}
