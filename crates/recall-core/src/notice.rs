//! User-facing outcome signals.
//!
//! Stores queue one [`Notice`] per operation; a presentation layer drains them
//! and decides how to show them. They carry meaning, not display text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  LoadCards,
  CreateCard,
  UpdateCard,
  DeleteCard,
  ReviewCard,
  RescheduleCard,
  LoadRules,
  ReplaceRules,
  ResetRules,
  RecordProgress,
  UpdateSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
  Success,
  Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
  pub action:  Action,
  #[serde(flatten)]
  pub outcome: Outcome,
}

impl Notice {
  pub fn is_success(&self) -> bool { self.outcome == Outcome::Success }
}

/// A queue of notices owned by a store.
#[derive(Debug, Default)]
pub struct Notices(Vec<Notice>);

impl Notices {
  /// Queue a notice reflecting `result` and hand the result back.
  pub fn track<T, E: std::fmt::Display>(
    &mut self,
    action: Action,
    result: Result<T, E>,
  ) -> Result<T, E> {
    let outcome = match &result {
      Ok(_) => Outcome::Success,
      Err(e) => Outcome::Failure(e.to_string()),
    };
    self.0.push(Notice { action, outcome });
    result
  }

  pub fn take(&mut self) -> Vec<Notice> { std::mem::take(&mut self.0) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn track_records_both_outcomes() {
    let mut notices = Notices::default();
    let ok: Result<u8, String> = notices.track(Action::CreateCard, Ok(1));
    assert_eq!(ok, Ok(1));
    let _ = notices.track::<u8, _>(Action::DeleteCard, Err("offline".to_owned()));

    let drained = notices.take();
    assert_eq!(drained.len(), 2);
    assert!(drained[0].is_success());
    assert_eq!(drained[1].outcome, Outcome::Failure("offline".into()));
    assert!(notices.take().is_empty());
  }
}
