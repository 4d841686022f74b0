use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::http_client::PageSource;

/// Script id of the legacy whole-state block
pub const LEGACY_STATE_ID: &str = "SIGI_STATE";
/// Script id of the modern rehydration block
pub const MODERN_STATE_ID: &str = "__UNIVERSAL_DATA_FOR_REHYDRATION__";
/// Marker key the modern block must carry to be trusted
pub const DEFAULT_SCOPE_KEY: &str = "__DEFAULT_SCOPE__";

pub const USER_DETAIL_KEY: &str = "webapp.user-detail";
pub const COMMENT_THREAD_KEY: &str = "MobileSharingComment";

/// Undo the platform's slash escaping in embedded JSON.
///
/// Both the JSON-escaped `\/\/` and a raw "//" become "/". This also
/// collapses legitimate double slashes, so `https://host` comes out as
/// `https:/host`.
pub fn sanitize_state_json(raw: &str) -> String {
    raw.replace(r"\/\/", "/").replace("//", "/")
}

/// Merged embedded-state namespaces of one rendered page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedState(Map<String, Value>);

impl EmbeddedState {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look a namespace up at the top level, then inside the default scope
    pub fn get(&self, namespace: &str) -> Option<&Value> {
        self.0.get(namespace).or_else(|| {
            self.0
                .get(DEFAULT_SCOPE_KEY)
                .and_then(|scope| scope.get(namespace))
        })
    }

    fn merge(&mut self, block: Map<String, Value>) {
        self.0.extend(block);
    }
}

/// Parse both known state blocks out of a page. Legacy is merged first so
/// the modern block wins on key collisions.
pub fn parse_embedded_state(html: &str) -> EmbeddedState {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("script[id]") {
        Ok(selector) => selector,
        Err(_) => return EmbeddedState::default(),
    };

    let mut legacy = None;
    let mut modern = None;

    for element in document.select(&selector) {
        match element.value().attr("id") {
            Some(LEGACY_STATE_ID) if legacy.is_none() => {
                legacy = Some(element.text().collect::<String>());
            }
            Some(MODERN_STATE_ID) if modern.is_none() => {
                modern = Some(element.text().collect::<String>());
            }
            _ => {}
        }
    }

    let mut state = EmbeddedState::default();

    if let Some(block) = legacy.as_deref().and_then(|text| parse_block(LEGACY_STATE_ID, text)) {
        state.merge(block);
    }

    if let Some(block) = modern.as_deref().and_then(|text| parse_block(MODERN_STATE_ID, text)) {
        if block.contains_key(DEFAULT_SCOPE_KEY) {
            state.merge(block);
        } else {
            debug!("{} block has no {} marker, ignoring", MODERN_STATE_ID, DEFAULT_SCOPE_KEY);
        }
    }

    state
}

fn parse_block(id: &str, text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(&sanitize_state_json(text)) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!("{} block is not a JSON object", id);
            None
        }
        Err(e) => {
            warn!("Failed to parse {} block: {}", id, e);
            None
        }
    }
}

/// Reads embedded state from public pages with a plain client
pub struct StateExtractor<S: PageSource> {
    source: S,
    base_url: String,
}

impl<S: PageSource> StateExtractor<S> {
    pub fn new(source: S, base_url: impl Into<String>) -> Self {
        Self {
            source,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch `url` and return its merged embedded state.
    ///
    /// Transport failures and non-200 responses both yield an empty state.
    pub async fn extract_state(&self, url: &str) -> EmbeddedState {
        let response = match self.source.get_page(url).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Plain fetch failed for {}: {}", url, e);
                return EmbeddedState::default();
            }
        };

        if !response.is_success() {
            debug!("Plain fetch for {} returned {}", url, response.status);
            return EmbeddedState::default();
        }

        parse_embedded_state(&response.body)
    }

    pub async fn user_detail(&self, username: &str) -> Option<Value> {
        let url = format!("{}/@{}", self.base_url, username);
        self.extract_state(&url).await.get(USER_DETAIL_KEY).cloned()
    }

    pub async fn comment_thread(&self, username: &str, post_id: &str) -> Option<Value> {
        let url = format!("{}/@{}/video/{}", self.base_url, username, post_id);
        self.extract_state(&url).await.get(COMMENT_THREAD_KEY).cloned()
    }
}
