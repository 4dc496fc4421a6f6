use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::{key_time, nullable, Name};

/// A periodically scheduled crawl, keyed by the date it was registered.
///
/// The request configuration is set once at creation. Only `occurrence`
/// changes afterwards: the crawler increments it and the repository resets it.
pub trait ScheduledJob:
    Serialize + DeserializeOwned + Clone + Send + Sync + std::fmt::Debug + 'static
{
    /// Label used in log lines and response messages.
    const KIND: &'static str;

    fn date(&self) -> DateTime<Utc>;
    fn reset_occurrence(&mut self);

    /// Brings `date` to key precision so lookups by date round-trip.
    fn normalize_date(&mut self);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerJob {
    pub date: DateTime<Utc>,
    pub occurrence: i32,
    pub dataset_name: Name,
    pub number_posts: i64,
    pub request: RedditCrawlerRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditCrawlerRequest {
    #[serde(deserialize_with = "nullable")]
    pub subreddits: Vec<String>,
    pub dataset_name: Name,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_limit: Option<i64>,
    /// Crawler options this service does not interpret.
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppReviewCrawlerJob {
    pub date: DateTime<Utc>,
    pub occurrence: i32,
    pub dataset_name: Name,
    pub request: AppReviewCrawlerRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppReviewCrawlerRequest {
    pub app_url: String,
    pub dataset_name: Name,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_selection: Option<String>,
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl ScheduledJob for CrawlerJob {
    const KIND: &'static str = "crawler job";

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    fn reset_occurrence(&mut self) {
        self.occurrence = 0;
    }

    fn normalize_date(&mut self) {
        self.date = key_time(self.date);
    }
}

impl ScheduledJob for AppReviewCrawlerJob {
    const KIND: &'static str = "app review crawler job";

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    fn reset_occurrence(&mut self) {
        self.occurrence = 0;
    }

    fn normalize_date(&mut self) {
        self.date = key_time(self.date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_request_options_survive_a_round_trip() {
        let job: CrawlerJob = serde_json::from_str(
            r#"{"date": "2022-02-02T10:00:00Z", "occurrence": 3, "dataset_name": "reddit_1",
                "request": {"subreddits": ["rust"], "dataset_name": "reddit_1",
                            "blacklist_comments": ["bot"], "comment_depth": 2}}"#,
        )
        .unwrap();
        assert_eq!(job.request.options.len(), 2);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["request"]["comment_depth"], 2);
        assert!(json["request"].get("date_from").is_none());
    }

    #[test]
    fn reset_only_touches_occurrence() {
        let mut job = AppReviewCrawlerJob {
            occurrence: 9,
            dataset_name: "reviews".to_string(),
            ..Default::default()
        };
        job.reset_occurrence();
        assert_eq!(job.occurrence, 0);
        assert_eq!(job.dataset_name, "reviews");
    }
}
