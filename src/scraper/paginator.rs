use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

use crate::error::{ScrapeError, ScrapeResult};
use super::fetcher::FetchResult;
use super::params::ParamSet;

/// How an endpoint reports that a response is usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCheck {
    /// Endpoint carries no status field
    None,
    /// `key` must be present and equal to `value`
    Equals { key: &'static str, value: i64 },
    /// `key` must be present and at least one
    AtLeastOne { key: &'static str },
}

impl StatusCheck {
    fn passes(&self, body: &Value) -> bool {
        match self {
            Self::None => true,
            Self::Equals { key, value } => body.get(*key).and_then(as_i64) == Some(*value),
            Self::AtLeastOne { key } => body.get(*key).and_then(as_i64).map_or(false, |n| n >= 1),
        }
    }
}

/// Where the paginated fields live in one endpoint's response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageShape {
    pub endpoint: &'static str,
    pub items_key: &'static str,
    /// `None` for endpoints that re-issue the same request every round
    pub cursor_key: Option<&'static str>,
    pub has_more_key: Option<&'static str>,
    pub status: StatusCheck,
}

/// One decoded pagination round
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
    pub has_more: bool,
    pub ok: bool,
}

impl PageShape {
    /// Decode one response. A raw body or a missing items field is a shape
    /// error; individual items that do not deserialize are dropped.
    pub fn read_page<T: DeserializeOwned>(&self, result: &FetchResult) -> ScrapeResult<Page<T>> {
        let body = match result {
            FetchResult::Json(body) => body,
            FetchResult::Raw(text) => {
                let preview: String = text.chars().take(80).collect();
                return Err(ScrapeError::shape(self.endpoint, format!("non-JSON body: {}", preview)));
            }
        };

        let raw_items = body
            .get(self.items_key)
            .and_then(Value::as_array)
            .ok_or_else(|| ScrapeError::shape(self.endpoint, format!("missing `{}`", self.items_key)))?;

        let mut items = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            match serde_json::from_value(raw.clone()) {
                Ok(item) => items.push(item),
                Err(e) => debug!("Skipping undecodable {} item: {}", self.endpoint, e),
            }
        }

        Ok(Page {
            items,
            cursor: self.cursor_key.and_then(|key| body.get(key)).and_then(cursor_token),
            has_more: self.has_more_key.and_then(|key| body.get(key)).map_or(false, truthy),
            ok: self.status.passes(body),
        })
    }
}

/// Why a pagination loop ended
#[derive(Debug, Clone)]
pub enum StopReason {
    /// Server reported no more data
    Exhausted,
    TargetReached,
    ShapeMismatch(ScrapeError),
    StatusRejected,
    FetchFailed(ScrapeError),
    RoundLimit { rounds: usize },
}

impl StopReason {
    /// The recoverable error behind an early stop, if any
    pub fn error(&self) -> Option<ScrapeError> {
        match self {
            Self::Exhausted | Self::TargetReached => None,
            Self::ShapeMismatch(err) | Self::FetchFailed(err) => Some(err.clone()),
            Self::StatusRejected => Some(ScrapeError::shape("pagination", "status indicator rejected")),
            Self::RoundLimit { rounds } => Some(ScrapeError::shape(
                "pagination",
                format!("more data still reported after {} rounds", rounds),
            )),
        }
    }
}

/// Items accumulated by one pagination loop
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub rounds: usize,
    pub stop: StopReason,
}

/// Cursor-driven accumulation loop shared by every list endpoint
#[derive(Debug, Clone)]
pub struct Paginator {
    pub target: usize,
    pub max_rounds: usize,
    start_cursor: String,
}

impl Paginator {
    pub fn new(target: usize, max_rounds: usize) -> Self {
        Self {
            target,
            max_rounds,
            start_cursor: "0".to_string(),
        }
    }

    /// Run rounds until the server runs dry, the target is met, a round
    /// fails, or the round cap is hit. Failures keep what was accumulated.
    ///
    /// `has_more == false` always wins: that round's items are all kept even
    /// past the target. Truncation happens only when the target ends the loop.
    pub async fn paginate<T, F, Fut>(&self, shape: &PageShape, params: ParamSet, mut fetch_page: F) -> Paginated<T>
    where
        T: DeserializeOwned,
        F: FnMut(ParamSet) -> Fut,
        Fut: Future<Output = ScrapeResult<FetchResult>>,
    {
        let mut items = Vec::new();
        let mut rounds = 0;

        if self.target == 0 {
            return Paginated { items, rounds, stop: StopReason::TargetReached };
        }

        let mut params = params;
        if let Some(key) = shape.cursor_key {
            params.set(key, self.start_cursor.as_str());
        }

        let stop = loop {
            if rounds >= self.max_rounds {
                warn!("{}: stopping after {} rounds with more data reported", shape.endpoint, rounds);
                break StopReason::RoundLimit { rounds };
            }
            rounds += 1;

            let result = match fetch_page(params.clone()).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("{}: round {} fetch failed: {}", shape.endpoint, rounds, e);
                    break StopReason::FetchFailed(e);
                }
            };

            let page: Page<T> = match shape.read_page(&result) {
                Ok(page) => page,
                Err(e) => {
                    warn!("{}: round {} unusable: {}", shape.endpoint, rounds, e);
                    break StopReason::ShapeMismatch(e);
                }
            };

            if !page.ok {
                warn!("{}: round {} rejected by status indicator", shape.endpoint, rounds);
                break StopReason::StatusRejected;
            }

            debug!("{}: round {} returned {} items", shape.endpoint, rounds, page.items.len());
            items.extend(page.items);

            if !page.has_more {
                break StopReason::Exhausted;
            }

            if items.len() >= self.target {
                items.truncate(self.target);
                break StopReason::TargetReached;
            }

            if let Some(key) = shape.cursor_key {
                match page.cursor {
                    Some(cursor) => params.set(key, cursor),
                    None => {
                        break StopReason::ShapeMismatch(ScrapeError::shape(
                            shape.endpoint,
                            format!("more data reported without `{}`", key),
                        ));
                    }
                }
            }
        };

        Paginated { items, rounds, stop }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        _ => false,
    }
}

fn cursor_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
