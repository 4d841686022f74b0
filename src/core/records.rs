use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::scraper::models::PostItem;

/// One exported row per scraped post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub url: String,
    pub user: String,
    pub author_name: String,
    pub likes: u64,
    pub views: u64,
    pub shares: u64,
    pub comment_count: u64,
    pub comment_texts: Vec<String>,
    pub caption: String,
    pub hashtags: String,
    pub music_title: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
}

impl PostRecord {
    pub fn assemble(base_url: &str, post: &PostItem, comment_texts: Vec<String>, collected_at: DateTime<Utc>) -> Self {
        let (caption, hashtags) = split_caption(&post.desc);

        Self {
            url: post_url(base_url, &post.author.unique_id, &post.id),
            user: post.author.unique_id.clone(),
            author_name: post.author.nickname.clone(),
            likes: post.stats.digg_count,
            views: post.stats.play_count,
            shares: post.stats.share_count,
            comment_count: post.stats.comment_count,
            comment_texts,
            caption: caption.to_string(),
            hashtags: hashtags.to_string(),
            music_title: post.music.as_ref().map(|m| m.title.clone()).unwrap_or_default(),
            posted_at: Utc.timestamp_opt(post.create_time, 0).single(),
            collected_at,
        }
    }
}

pub fn post_url(base_url: &str, user: &str, post_id: &str) -> String {
    format!("{}/@{}/video/{}", base_url.trim_end_matches('/'), user, post_id)
}

/// Split a description at its first `#` into caption and hashtag run
pub fn split_caption(desc: &str) -> (&str, &str) {
    match desc.find('#') {
        Some(pos) => desc.split_at(pos),
        None => (desc, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::models::{PostAuthor, PostMusic, PostStats};

    fn post(desc: &str, music: Option<&str>) -> PostItem {
        PostItem {
            id: "7285391124246646049".to_string(),
            desc: desc.to_string(),
            create_time: 1_696_500_000,
            author: PostAuthor {
                unique_id: "redbull".to_string(),
                nickname: "Red Bull".to_string(),
            },
            stats: PostStats {
                digg_count: 10,
                play_count: 200,
                share_count: 3,
                comment_count: 4,
            },
            music: music.map(|title| PostMusic { title: title.to_string() }),
        }
    }

    #[test]
    fn test_split_caption() {
        assert_eq!(split_caption("fit check #fashion #ootd"), ("fit check ", "#fashion #ootd"));
        assert_eq!(split_caption("#fashion"), ("", "#fashion"));
        assert_eq!(split_caption("no tags here"), ("no tags here", ""));
        assert_eq!(split_caption(""), ("", ""));
    }

    #[test]
    fn test_assemble_record() {
        let collected = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = PostRecord::assemble(
            "https://www.tiktok.com/",
            &post("street look #fashion", Some("original sound")),
            vec!["love it".to_string()],
            collected,
        );

        assert_eq!(record.url, "https://www.tiktok.com/@redbull/video/7285391124246646049");
        assert_eq!(record.author_name, "Red Bull");
        assert_eq!(record.views, 200);
        assert_eq!(record.caption, "street look ");
        assert_eq!(record.hashtags, "#fashion");
        assert_eq!(record.music_title, "original sound");
        assert_eq!(record.posted_at.unwrap().timestamp(), 1_696_500_000);
        assert_eq!(record.collected_at, collected);
        assert_eq!(record.comment_texts, vec!["love it".to_string()]);
    }

    #[test]
    fn test_missing_music_is_empty() {
        let record = PostRecord::assemble("https://www.tiktok.com", &post("x", None), Vec::new(), Utc::now());
        assert_eq!(record.music_title, "");
    }
}
