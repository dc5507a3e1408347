//! Blocking GraphQL client for The Graph gateway.
//!
//! All three fetchers page through their collection the same way: rows are
//! ordered by `id` ascending and the last seen id goes back as an `id_gt`
//! cursor. The gateway caps page sizes, so the cursor loop is the only way
//! to cover a full day of swaps.
//!
//! There is no retry/backoff: a transient network failure aborts the run,
//! which a rerun of the failing stage handles.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{DateRange, RunConfig};
use crate::error::AppError;

const GATEWAY_BASE: &str = "https://gateway.thegraph.com/api";

/// A subgraph row that exposes its pagination cursor.
pub trait PagedRow: serde::de::DeserializeOwned {
    fn id(&self) -> &str;
}

pub struct SubgraphClient {
    http: Client,
    api_key: String,
    page_size: usize,
    page_delay: Duration,
}

impl SubgraphClient {
    /// Build a client from the environment (`GRAPH_API_KEY`, also read from
    /// `.env`).
    pub fn from_env(config: &RunConfig) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("GRAPH_API_KEY")
            .map_err(|_| AppError::new(2, "Missing GRAPH_API_KEY in environment (.env)."))?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            page_size: config.page_size,
            page_delay: config.page_delay,
        })
    }

    /// Fetch every `collection` row within `range`, following the id cursor
    /// until an empty page comes back.
    pub fn fetch_all<R: PagedRow>(
        &self,
        subgraph_id: &str,
        collection: &str,
        query: &str,
        range: &DateRange,
    ) -> Result<Vec<R>, AppError> {
        let url = format!("{GATEWAY_BASE}/{}/subgraphs/id/{subgraph_id}", self.api_key);

        let mut rows: Vec<R> = Vec::new();
        let mut last_id = String::new();

        loop {
            let variables = json!({
                "startTime": range.start_unix(),
                "endTime": range.end_unix(),
                "lastID": last_id,
                "first": self.page_size,
            });

            let resp = self
                .http
                .post(&url)
                .json(&json!({ "query": query, "variables": variables }))
                .send()
                .map_err(|e| AppError::new(4, format!("Subgraph request failed: {e}")))?;

            if !resp.status().is_success() {
                return Err(AppError::new(
                    4,
                    format!("Subgraph request failed with status {}.", resp.status()),
                ));
            }

            let body: GraphResponse = resp
                .json()
                .map_err(|e| AppError::new(4, format!("Failed to parse subgraph response: {e}")))?;

            let page = decode_page::<R>(body, collection)?;

            let Some(last) = page.last() else {
                break;
            };
            last_id = last.id().to_string();
            rows.extend(page);

            // Gateway rate limit.
            thread::sleep(self.page_delay);
        }

        Ok(rows)
    }
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<serde_json::Value>,
    errors: Option<Vec<GraphErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEntry {
    message: String,
}

fn decode_page<R: PagedRow>(body: GraphResponse, collection: &str) -> Result<Vec<R>, AppError> {
    if let Some(errors) = body.errors {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(AppError::new(
            4,
            format!("Subgraph returned errors: {}", messages.join("; ")),
        ));
    }

    let page = body
        .data
        .and_then(|mut data| data.get_mut(collection).map(serde_json::Value::take))
        .ok_or_else(|| {
            AppError::new(4, format!("Subgraph response missing `{collection}` data."))
        })?;

    serde_json::from_value(page)
        .map_err(|e| AppError::new(4, format!("Malformed `{collection}` rows: {e}")))
}
