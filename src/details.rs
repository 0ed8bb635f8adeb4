//! Bounded fan-out fetch of award detail records.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::future::Future;

use futures_util::future::join_all;
use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;

use crate::error::ValidationError;
use crate::models::parse::{non_blank, parse_u32, split_list};

/// Hard ceiling on IDs per call, and so on fetches in flight.
pub const MAX_DETAIL_IDS: usize = 10;

pub fn award_detail_endpoint(award_id: &str) -> String {
    format!("awards/{award_id}/")
}

/// A validated batch of award IDs and the concurrency to fetch them with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardDetailsRequest {
    pub award_ids: Vec<String>,
    pub max_concurrent: usize,
}

impl AwardDetailsRequest {
    /// Parses a comma-separated ID list.
    ///
    /// More than `max_ids` IDs is rejected outright; `max_ids` itself never
    /// exceeds [`MAX_DETAIL_IDS`]. Duplicates are fetched once, and the
    /// concurrency is clamped to `1..=min(max_ids, ids)`.
    pub fn from_params(
        award_ids: Option<&str>,
        max_concurrent: Option<&str>,
        max_ids: usize,
    ) -> Result<Self, ValidationError> {
        let max_ids = max_ids.clamp(1, MAX_DETAIL_IDS);
        let requested = split_list(non_blank(award_ids).unwrap_or_default());
        if requested.is_empty() {
            return Err(ValidationError::MissingField("award_ids"));
        }
        if requested.len() > max_ids {
            return Err(ValidationError::out_of_range(
                "award_ids",
                format!(
                    "{} award IDs requested, at most {max_ids} allowed per call",
                    requested.len()
                ),
            ));
        }

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(requested.len());
        for id in requested {
            if id.contains(['/', '?', '#']) || id.chars().any(char::is_whitespace) {
                return Err(ValidationError::format(
                    "award_ids",
                    format!("'{id}' is not a valid award ID"),
                ));
            }
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }

        let wanted = match non_blank(max_concurrent) {
            Some(raw) => parse_u32("max_concurrent", raw)? as usize,
            None => max_ids,
        };
        let max_concurrent = wanted.min(max_ids).min(ids.len()).max(1);

        Ok(Self {
            award_ids: ids,
            max_concurrent,
        })
    }
}

/// Per-ID outcome of a detail fetch. Failures are reported, not raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFetchSummary {
    pub success_count: usize,
    pub error_count: usize,
    pub results: BTreeMap<String, Value>,
    pub errors: BTreeMap<String, String>,
}

impl DetailFetchSummary {
    fn record(&mut self, id: String, outcome: Result<Value, String>) {
        match outcome {
            Ok(detail) => {
                self.success_count += 1;
                self.results.insert(id, detail);
            }
            Err(message) => {
                self.error_count += 1;
                self.errors.insert(id, message);
            }
        }
    }

    /// JSON form; `errors` is present only when something failed.
    pub fn into_value(self) -> Value {
        let mut output = Map::new();
        output.insert("success_count".to_string(), json!(self.success_count));
        output.insert("error_count".to_string(), json!(self.error_count));
        output.insert(
            "results".to_string(),
            Value::Object(self.results.into_iter().collect()),
        );
        if !self.errors.is_empty() {
            let errors = self
                .errors
                .into_iter()
                .map(|(id, message)| (id, Value::String(message)))
                .collect();
            output.insert("errors".to_string(), Value::Object(errors));
        }
        Value::Object(output)
    }
}

/// Fetches every ID in `request` with at most `request.max_concurrent`
/// fetches in flight. A failing ID never cancels its siblings.
pub async fn fetch_details<F, Fut, E>(request: &AwardDetailsRequest, fetch: F) -> DetailFetchSummary
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Value, E>>,
    E: Display,
{
    let mut summary = DetailFetchSummary::default();

    if let [id] = request.award_ids.as_slice() {
        let outcome = fetch(id.clone()).await.map_err(|err| err.to_string());
        log_failure(id, &outcome);
        summary.record(id.clone(), outcome);
        return summary;
    }

    let semaphore = Semaphore::new(request.max_concurrent);
    let semaphore = &semaphore;
    let fetch = &fetch;
    let tasks = request.award_ids.iter().map(|id| async move {
        let outcome = match semaphore.acquire().await {
            Ok(_permit) => fetch(id.clone()).await.map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        (id.clone(), outcome)
    });

    tracing::debug!(
        ids = request.award_ids.len(),
        max_concurrent = request.max_concurrent,
        "fetching award details"
    );
    for (id, outcome) in join_all(tasks).await {
        log_failure(&id, &outcome);
        summary.record(id, outcome);
    }
    summary
}

fn log_failure(id: &str, outcome: &Result<Value, String>) {
    if let Err(message) = outcome {
        tracing::warn!(award_id = id, error = %message, "award detail fetch failed");
    }
}
