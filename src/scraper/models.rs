use serde::{Deserialize, Serialize};

/// One post as returned by the item-list endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostItem {
    pub id: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub create_time: i64,
    pub author: PostAuthor,
    #[serde(default)]
    pub stats: PostStats,
    #[serde(default)]
    pub music: Option<PostMusic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAuthor {
    pub unique_id: String,
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStats {
    #[serde(default)]
    pub digg_count: u64,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default)]
    pub share_count: u64,
    #[serde(default)]
    pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMusic {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentItem {
    #[serde(default)]
    pub text: String,
}

/// Comment thread embedded in a post page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentThread {
    #[serde(default)]
    pub comments: Vec<CommentItem>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl CommentThread {
    pub fn texts(&self) -> Vec<String> {
        self.comments.iter().map(|c| c.text.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_item_from_api() {
        let post: PostItem = serde_json::from_value(json!({
            "id": "7285391124246646049",
            "desc": "fit check #fashion #ootd",
            "createTime": 1696500000,
            "author": { "uniqueId": "redbull", "nickname": "Red Bull" },
            "stats": { "diggCount": 10, "playCount": 200, "shareCount": 3, "commentCount": 4 },
            "music": { "title": "original sound" },
            "video": { "duration": 15 }
        }))
        .unwrap();

        assert_eq!(post.author.unique_id, "redbull");
        assert_eq!(post.stats.play_count, 200);
        assert_eq!(post.music.unwrap().title, "original sound");
    }

    #[test]
    fn test_post_item_without_music() {
        let post: PostItem = serde_json::from_value(json!({
            "id": "1",
            "author": { "uniqueId": "someone" }
        }))
        .unwrap();

        assert!(post.music.is_none());
        assert_eq!(post.stats, PostStats::default());
    }

    #[test]
    fn test_comment_thread_texts() {
        let thread: CommentThread = serde_json::from_value(json!({
            "comments": [{ "text": "first" }, { "text": "second", "cid": "9" }],
            "total": 2
        }))
        .unwrap();

        assert_eq!(thread.texts(), vec!["first".to_string(), "second".to_string()]);
    }
}
