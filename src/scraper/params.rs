use std::collections::BTreeMap;
use url::Url;

use crate::config::ScraperConfig;
use crate::error::{ScrapeError, ScrapeResult};
use super::fingerprint::Fingerprint;

/// Query parameters for one API call, kept in key order so that identical
/// inputs always encode to identical URLs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet(BTreeMap<String, String>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Append the parameters to `base` as a percent-encoded query string
    pub fn to_url(&self, base: &str) -> ScrapeResult<String> {
        let mut url = Url::parse(base)
            .map_err(|e| ScrapeError::config(format!("Invalid endpoint URL {}: {}", base, e)))?;
        url.query_pairs_mut().extend_pairs(self.iter());
        Ok(url.into())
    }
}

/// Build the canonical parameter block every endpoint expects, then apply
/// the call-specific overrides on top.
pub fn build_params<I, K, V>(fingerprint: &Fingerprint, config: &ScraperConfig, overrides: I) -> ParamSet
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut params = ParamSet::new()
        // application identity
        .with("aid", "1988")
        .with("app_name", "tiktok_web")
        .with("channel", "tiktok_web")
        .with("device_platform", "web_pc")
        .with("app_language", config.language.as_str())
        .with("language", config.language.as_str())
        .with("webcast_language", config.language.as_str())
        .with("region", config.region.as_str())
        .with("priority_region", "")
        .with("tz_name", config.timezone.as_str())
        .with("device_id", config.device_id.as_str())
        // browser state
        .with("browser_language", fingerprint.browser_language.as_str())
        .with("browser_name", "Mozilla")
        .with("browser_online", "true")
        .with("browser_platform", fingerprint.platform.as_str())
        .with("browser_version", fingerprint.user_agent.as_str())
        .with("cookie_enabled", "true")
        .with("focus_state", "true")
        .with("from_page", "user")
        .with("history_len", fingerprint.history_length.to_string())
        .with("is_fullscreen", "false")
        .with("is_page_visible", "true")
        .with("os", fingerprint.platform.as_str())
        .with("referer", "")
        .with("screen_height", fingerprint.screen_height.to_string())
        .with("screen_width", fingerprint.screen_width.to_string());

    for (key, value) in overrides {
        params.set(key, value);
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint() -> Fingerprint {
        Fingerprint {
            platform: "iPhone".to_string(),
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X)".to_string(),
            screen_width: 430,
            screen_height: 932,
            history_length: 2,
            browser_language: "en-US".to_string(),
        }
    }

    #[test]
    fn test_build_params_is_deterministic() {
        let fp = fingerprint();
        let config = ScraperConfig::default();
        let overrides = [("cursor", "30"), ("challengeID", "5399")];

        let first = build_params(&fp, &config, overrides);
        let second = build_params(&fp, &config, overrides);

        assert_eq!(first, second);
        assert_eq!(
            first.to_url("https://www.tiktok.com/api/challenge/item_list/").unwrap(),
            second.to_url("https://www.tiktok.com/api/challenge/item_list/").unwrap()
        );
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let params = build_params(&fingerprint(), &ScraperConfig::default(), [("from_page", "fyp")]);
        assert_eq!(params.get("from_page"), Some("fyp"));
        assert_eq!(params.get("aid"), Some("1988"));
        assert_eq!(params.get("screen_width"), Some("430"));
        assert_eq!(params.get("os"), Some("iPhone"));
    }

    #[test]
    fn test_identity_block_always_present() {
        let params = build_params(&fingerprint(), &ScraperConfig::default(), Vec::<(String, String)>::new());
        for key in ["aid", "app_name", "channel", "device_id", "tz_name", "app_language"] {
            assert!(params.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_to_url_encodes_values() {
        let params = ParamSet::new().with("keyword", "street wear&co");
        let url = params.to_url("https://www.tiktok.com/api/search/general/sug/").unwrap();
        assert!(url.starts_with("https://www.tiktok.com/api/search/general/sug/?keyword="));
        assert!(!url.contains(' '));
        assert!(url.contains("%26co"));
    }
}
