// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::ingest::allowlist::KnownAuthor;

/// One item exactly as a stream source delivered it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawItem {
    pub id: String,
    pub author: String,    // case as supplied by the source
    pub body: String,      // may still carry HTML entities
    pub permalink: String, // e.g. "/r/2007scape/comments/abc/x/def/"
    pub title: Option<String>,
    #[serde(default)]
    pub created_utc: Option<i64>,
}

impl RawItem {
    /// Posts carry a title, comments don't.
    pub fn kind(&self) -> ItemKind {
        if self.title.is_some() {
            ItemKind::Post
        } else {
            ItemKind::Comment
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Comment,
    Post,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Comment => "comment",
            ItemKind::Post => "post",
        }
    }
}

/// Source-agnostic notification produced by the ingest filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub text: String,
    pub url: String,
    pub title: Option<String>,
    pub author: Option<KnownAuthor>,
    pub created_utc: Option<i64>,
}

#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    /// Establish the session before the first poll. Failing here disables the stream.
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_latest(&self) -> Result<Vec<RawItem>>;

    fn name(&self) -> &'static str;
}
