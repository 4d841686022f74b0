use serde_json::Value;
use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::error::ScrapeResult;
use super::fetcher::{AuthenticatedFetcher, FetchResult, PageContext};
use super::fingerprint::Fingerprint;
use super::models::PostItem;
use super::paginator::{PageShape, Paginated, Paginator, StatusCheck};
use super::params::{build_params, ParamSet};

/// Hard cap on the recommendation feed
pub const RECOMMENDATION_CAP: usize = 100;

const SEARCH_PAGE_SIZE: &str = "20";

const WEB_SEARCH_CODE: &str = r#"{"tiktok":{"client_params_x":{"search_engine":{"ies_mt_user_live_video_card_use_libra":1,"mt_search_general_user_live_card":1}},"search_server":{}}}"#;

pub const RECOMMEND_SHAPE: PageShape = PageShape {
    endpoint: "recommend/item_list",
    items_key: "itemList",
    cursor_key: None,
    has_more_key: Some("hasMore"),
    status: StatusCheck::None,
};

pub const TAG_POSTS_SHAPE: PageShape = PageShape {
    endpoint: "challenge/item_list",
    items_key: "itemList",
    cursor_key: Some("cursor"),
    has_more_key: Some("hasMore"),
    status: StatusCheck::Equals { key: "statusCode", value: 0 },
};

pub const USER_SEARCH_SHAPE: PageShape = PageShape {
    endpoint: "search/user/full",
    items_key: "user_list",
    cursor_key: Some("cursor"),
    has_more_key: Some("has_more"),
    status: StatusCheck::Equals { key: "statusCode", value: 0 },
};

pub const COMMENTS_SHAPE: PageShape = PageShape {
    endpoint: "comment/list",
    items_key: "comments",
    cursor_key: Some("cursor"),
    has_more_key: Some("has_more"),
    status: StatusCheck::AtLeastOne { key: "total" },
};

/// Platform API calls issued through a live session
pub struct PlatformApi<'s, P: PageContext + ?Sized> {
    fetcher: AuthenticatedFetcher<'s, P>,
    fingerprint: &'s Fingerprint,
    config: &'s ScraperConfig,
}

impl<'s, P: PageContext + ?Sized> PlatformApi<'s, P> {
    pub fn new(fetcher: AuthenticatedFetcher<'s, P>, fingerprint: &'s Fingerprint, config: &'s ScraperConfig) -> Self {
        Self { fetcher, fingerprint, config }
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/api/{}/", self.config.base_url.trim_end_matches('/'), path)
    }

    fn params<'a>(&self, overrides: impl IntoIterator<Item = (&'a str, String)>) -> ParamSet {
        build_params(self.fingerprint, self.config, overrides)
    }

    async fn fetch(&self, path: &str, params: &ParamSet) -> ScrapeResult<FetchResult> {
        let url = params.to_url(&self.endpoint_url(path))?;
        self.fetcher.fetch(&url).await
    }

    async fn run_paginated<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        shape: &PageShape,
        paginator: Paginator,
        params: ParamSet,
    ) -> ScrapeResult<Paginated<T>> {
        let base = self.endpoint_url(path);
        let base = base.as_str();
        let fetcher = &self.fetcher;

        let result = paginator
            .paginate(shape, params, move |params: ParamSet| async move {
                let url = params.to_url(base)?;
                fetcher.fetch(&url).await
            })
            .await;

        debug!(
            "{}: {} items in {} rounds ({:?})",
            shape.endpoint,
            result.items.len(),
            result.rounds,
            result.stop
        );
        Ok(result)
    }

    /// Posts from the recommendation feed, at most [`RECOMMENDATION_CAP`]
    pub async fn recommendations(&self, count: usize) -> ScrapeResult<Paginated<PostItem>> {
        let params = self.params([
            ("from_page", "fyp".to_string()),
            ("count", self.config.page_size.to_string()),
        ]);
        let paginator = Paginator::new(count.min(RECOMMENDATION_CAP), self.config.max_rounds);
        self.run_paginated("recommend/item_list", &RECOMMEND_SHAPE, paginator, params).await
    }

    /// Challenge metadata for a hashtag, absent unless the platform says ok
    pub async fn challenge_info(&self, tag: &str) -> ScrapeResult<Option<Value>> {
        let params = self.params([
            ("from_page", "hashtag".to_string()),
            ("challengeName", tag.to_string()),
        ]);
        let result = self.fetch("challenge/detail", &params).await?;

        Ok(result.as_json().and_then(|body| {
            let ok = body.get("statusCode").and_then(Value::as_i64) == Some(0);
            if ok {
                body.get("challengeInfo").cloned()
            } else {
                None
            }
        }))
    }

    /// Posts tagged with `tag`; absent when the challenge cannot be resolved
    pub async fn tag_posts(&self, tag: &str, count: usize) -> ScrapeResult<Option<Paginated<PostItem>>> {
        let challenge_id = match self.challenge_info(tag).await? {
            Some(info) => match challenge_id(&info) {
                Some(id) => id,
                None => return Ok(None),
            },
            None => return Ok(None),
        };

        info!("Resolved #{} to challenge {}", tag, challenge_id);

        let params = self.params([
            ("challengeID", challenge_id),
            ("coverFormat", "2".to_string()),
            ("count", self.config.page_size.to_string()),
        ]);
        let paginator = Paginator::new(count, self.config.max_rounds);
        self.run_paginated("challenge/item_list", &TAG_POSTS_SHAPE, paginator, params)
            .await
            .map(Some)
    }

    /// Keyword suggestions, absent unless the platform says ok
    pub async fn search_suggest(&self, keyword: &str) -> ScrapeResult<Option<Value>> {
        let params = self.params([
            ("from_page", "search".to_string()),
            ("keyword", keyword.to_string()),
        ]);
        let result = self.fetch("search/general/sug", &params).await?;

        Ok(result.as_json().and_then(|body| {
            let ok = body.get("status_code").and_then(Value::as_i64) == Some(0);
            if ok {
                body.get("sug_list").cloned()
            } else {
                None
            }
        }))
    }

    pub async fn search_users(&self, keyword: &str, count: usize) -> ScrapeResult<Paginated<Value>> {
        let params = self.params([
            ("count", SEARCH_PAGE_SIZE.to_string()),
            ("from_page", "search".to_string()),
            ("keyword", keyword.to_string()),
            ("root_referer", self.config.seed_url.clone()),
            ("web_search_code", WEB_SEARCH_CODE.to_string()),
        ]);
        let paginator = Paginator::new(count, self.config.max_rounds);
        self.run_paginated("search/user/full", &USER_SEARCH_SHAPE, paginator, params).await
    }

    pub async fn post_comments(&self, post_id: &str, count: usize) -> ScrapeResult<Paginated<Value>> {
        let params = self.params([
            ("from_page", "video".to_string()),
            ("fromWeb", "1".to_string()),
            ("app_language", "ja-JP".to_string()),
            ("current_region", "JP".to_string()),
            ("aweme_id", post_id.to_string()),
            ("is_non_personalized", "false".to_string()),
            ("enter_from", "tiktok_web".to_string()),
        ]);
        let paginator = Paginator::new(count, self.config.max_rounds);
        self.run_paginated("comment/list", &COMMENTS_SHAPE, paginator, params).await
    }
}

/// Challenge id out of a `challengeInfo` object; the platform sends it as
/// a string but older payloads used a number
fn challenge_id(info: &Value) -> Option<String> {
    match info.get("challenge")?.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::scraper::fetcher::{api_headers, HeaderBundle};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned bodies and records the requested URLs
    struct CannedPage {
        bodies: Mutex<VecDeque<String>>,
        urls: Mutex<Vec<String>>,
    }

    impl CannedPage {
        fn new(bodies: Vec<Value>) -> Self {
            Self {
                bodies: Mutex::new(bodies.into_iter().map(|b| b.to_string()).collect()),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<url::Url> {
            self.urls
                .lock()
                .unwrap()
                .iter()
                .map(|u| url::Url::parse(u).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl PageContext for CannedPage {
        async fn fetch_text(&self, url: &str, _headers: &HeaderBundle) -> ScrapeResult<String> {
            self.urls.lock().unwrap().push(url.to_string());
            self.bodies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ScrapeError::session_fetch(url, "no more canned bodies"))
        }
    }

    fn fingerprint() -> Fingerprint {
        Fingerprint {
            platform: "iPhone".to_string(),
            user_agent: "Mozilla/5.0 (iPhone)".to_string(),
            screen_width: 430,
            screen_height: 932,
            history_length: 2,
            browser_language: "en-US".to_string(),
        }
    }

    fn post(id: &str) -> Value {
        json!({
            "id": id,
            "desc": "look #fashion",
            "createTime": 1696500000,
            "author": { "uniqueId": "creator", "nickname": "Creator" },
            "stats": { "diggCount": 1, "playCount": 2, "shareCount": 3, "commentCount": 4 }
        })
    }

    fn query(url: &url::Url, key: &str) -> Option<String> {
        url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn test_tag_posts_resolves_challenge_then_paginates() {
        let page = CannedPage::new(vec![
            json!({ "statusCode": 0, "challengeInfo": { "challenge": { "id": "5399", "title": "fashion" } } }),
            json!({ "statusCode": 0, "itemList": [post("1"), post("2")], "hasMore": true, "cursor": "2" }),
            json!({ "statusCode": 0, "itemList": [post("3")], "hasMore": false, "cursor": "3" }),
        ]);
        let fp = fingerprint();
        let config = ScraperConfig::default();
        let api = PlatformApi::new(
            AuthenticatedFetcher::new(&page, api_headers(&config.base_url, &config.user_agent)),
            &fp,
            &config,
        );

        let result = api.tag_posts("fashion", 25).await.unwrap().unwrap();
        assert_eq!(result.items.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["1", "2", "3"]);

        let urls = page.urls();
        assert_eq!(urls[0].path(), "/api/challenge/detail/");
        assert_eq!(query(&urls[0], "challengeName").as_deref(), Some("fashion"));
        assert_eq!(urls[1].path(), "/api/challenge/item_list/");
        assert_eq!(query(&urls[1], "challengeID").as_deref(), Some("5399"));
        assert_eq!(query(&urls[1], "cursor").as_deref(), Some("0"));
        assert_eq!(query(&urls[1], "coverFormat").as_deref(), Some("2"));
        assert_eq!(query(&urls[2], "cursor").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_tag_posts_absent_challenge() {
        let page = CannedPage::new(vec![json!({ "statusCode": 10205 })]);
        let fp = fingerprint();
        let config = ScraperConfig::default();
        let api = PlatformApi::new(AuthenticatedFetcher::new(&page, HeaderBundle::new()), &fp, &config);

        assert!(api.tag_posts("nope", 25).await.unwrap().is_none());
        assert_eq!(page.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_recommendations_are_capped() {
        let items: Vec<Value> = (0..30).map(|i| post(&i.to_string())).collect();
        let bodies = (0..5)
            .map(|_| json!({ "itemList": items.clone(), "hasMore": true }))
            .collect();
        let page = CannedPage::new(bodies);
        let fp = fingerprint();
        let config = ScraperConfig::default();
        let api = PlatformApi::new(AuthenticatedFetcher::new(&page, HeaderBundle::new()), &fp, &config);

        let result = api.recommendations(500).await.unwrap();
        assert_eq!(result.items.len(), RECOMMENDATION_CAP);
        assert_eq!(page.urls().len(), 4);
        assert_eq!(query(&page.urls()[0], "from_page").as_deref(), Some("fyp"));
    }

    #[tokio::test]
    async fn test_search_suggest_status() {
        let page = CannedPage::new(vec![
            json!({ "status_code": 0, "sug_list": [{ "content": "fashion week" }] }),
            json!({ "status_code": 8, "sug_list": [] }),
        ]);
        let fp = fingerprint();
        let config = ScraperConfig::default();
        let api = PlatformApi::new(AuthenticatedFetcher::new(&page, HeaderBundle::new()), &fp, &config);

        let list = api.search_suggest("fashion").await.unwrap().unwrap();
        assert_eq!(list[0]["content"], json!("fashion week"));
        assert!(api.search_suggest("fashion").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_comments_stop_on_zero_total() {
        let page = CannedPage::new(vec![
            json!({ "total": 3, "comments": [{ "text": "a" }, { "text": "b" }], "has_more": 1, "cursor": 2 }),
            json!({ "total": 0, "comments": [], "has_more": 0, "cursor": 2 }),
        ]);
        let fp = fingerprint();
        let config = ScraperConfig::default();
        let api = PlatformApi::new(AuthenticatedFetcher::new(&page, HeaderBundle::new()), &fp, &config);

        let result = api.post_comments("7198199504405843205", 10).await.unwrap();
        assert_eq!(result.items.len(), 2);

        let urls = page.urls();
        assert_eq!(query(&urls[0], "aweme_id").as_deref(), Some("7198199504405843205"));
        assert_eq!(query(&urls[1], "cursor").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_search_users_params() {
        let page = CannedPage::new(vec![json!({
            "statusCode": 0,
            "user_list": [{ "user_info": { "unique_id": "a" } }],
            "has_more": 0,
            "cursor": 1
        })]);
        let fp = fingerprint();
        let config = ScraperConfig::default();
        let api = PlatformApi::new(AuthenticatedFetcher::new(&page, HeaderBundle::new()), &fp, &config);

        let result = api.search_users("fashion", 10).await.unwrap();
        assert_eq!(result.items.len(), 1);

        let url = &page.urls()[0];
        assert_eq!(query(url, "count").as_deref(), Some("20"));
        assert_eq!(query(url, "root_referer"), Some(config.seed_url.clone()));
        assert!(query(url, "web_search_code").unwrap().contains("search_engine"));
    }
}
