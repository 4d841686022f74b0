use serde::{Deserialize, Serialize};

use crate::error::{ScrapeError, ScrapeResult};

/// Script evaluated in the bootstrapped page to read its identity
pub const FINGERPRINT_PROBE: &str = r#"() => {
    return {
        platform: window.navigator.platform,
        userAgent: window.navigator.userAgent,
        screenWidth: window.screen.width,
        screenHeight: window.screen.height,
        historyLength: window.history.length,
        browserLanguage: window.navigator.language,
    };
}"#;

/// Browser identity captured once per job from the live page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub platform: String,
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub history_length: u32,
    pub browser_language: String,
}

impl Fingerprint {
    /// Build from the value returned by [`FINGERPRINT_PROBE`]
    pub fn from_probe(value: serde_json::Value) -> ScrapeResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| ScrapeError::bootstrap(format!("Unreadable fingerprint probe result: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_probe() {
        let fp = Fingerprint::from_probe(json!({
            "platform": "iPhone",
            "userAgent": "Mozilla/5.0 (iPhone)",
            "screenWidth": 430,
            "screenHeight": 932,
            "historyLength": 2,
            "browserLanguage": "en-US"
        }))
        .unwrap();

        assert_eq!(fp.platform, "iPhone");
        assert_eq!(fp.screen_width, 430);
        assert_eq!(fp.history_length, 2);
    }

    #[test]
    fn test_from_probe_missing_field() {
        let err = Fingerprint::from_probe(json!({ "platform": "iPhone" })).unwrap_err();
        assert_eq!(err.category(), "session");
    }
}
