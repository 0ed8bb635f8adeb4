//! Sequential multi-page aggregation for paginated search endpoints.

use std::fmt::Display;
use std::future::Future;

use serde_json::{Map, Value, json};

/// A request that carries its own page number.
pub trait Paginated: Clone {
    fn page(&self) -> u32;

    fn set_page(&mut self, page: u32);
}

/// Fetches up to `max_pages` pages starting at `request.page()` and merges
/// their `results` in page order.
///
/// A failure on the first page is returned as-is. Later failures end the loop
/// and the pages gathered so far are returned. A page with no results is
/// treated as the end of the data even when `page_metadata.hasNext` is true.
///
/// The returned object is the last page fetched, with `results` replaced by
/// the accumulation and `page_metadata` extended with `total_results_fetched`,
/// `pages_fetched`, `requested_max_pages`, `has_more_pages` and
/// `fetch_completed`.
pub async fn fetch_pages<R, F, Fut, E>(
    request: &R,
    max_pages: u32,
    mut fetch_page: F,
) -> Result<Value, E>
where
    R: Paginated,
    F: FnMut(R) -> Fut,
    Fut: Future<Output = Result<Value, E>>,
    E: Display,
{
    let max_pages = max_pages.max(1);
    let mut current = request.clone();

    let mut last = fetch_page(current.clone()).await?;
    let mut results = take_results(&mut last);
    let mut pages_fetched: u32 = 1;
    let mut has_next = has_next_page(&last) && !results.is_empty();

    while has_next && pages_fetched < max_pages {
        let next_page = current.page().saturating_add(1);
        current.set_page(next_page);

        let mut response = match fetch_page(current.clone()).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    page = next_page,
                    pages_fetched,
                    error = %err,
                    "page fetch failed, returning partial results"
                );
                break;
            }
        };

        let page_results = take_results(&mut response);
        pages_fetched += 1;
        has_next = has_next_page(&response);
        last = response;

        if page_results.is_empty() {
            tracing::debug!(page = next_page, "empty page, treating as end of data");
            has_next = false;
            break;
        }
        results.extend(page_results);
    }

    let fetch_completed = !has_next || pages_fetched >= max_pages;
    tracing::debug!(
        pages_fetched,
        results = results.len(),
        has_more_pages = has_next,
        "pagination finished"
    );

    let mut output = match last {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut page_metadata = match output.remove("page_metadata") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    page_metadata.insert("total_results_fetched".to_string(), json!(results.len()));
    page_metadata.insert("pages_fetched".to_string(), json!(pages_fetched));
    page_metadata.insert("requested_max_pages".to_string(), json!(max_pages));
    page_metadata.insert("has_more_pages".to_string(), json!(has_next));
    page_metadata.insert("fetch_completed".to_string(), json!(fetch_completed));

    output.insert("results".to_string(), Value::Array(results));
    output.insert("page_metadata".to_string(), Value::Object(page_metadata));
    Ok(Value::Object(output))
}

fn take_results(response: &mut Value) -> Vec<Value> {
    response
        .get_mut("results")
        .and_then(Value::as_array_mut)
        .map(std::mem::take)
        .unwrap_or_default()
}

fn has_next_page(response: &Value) -> bool {
    response
        .get("page_metadata")
        .and_then(|metadata| metadata.get("hasNext"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
