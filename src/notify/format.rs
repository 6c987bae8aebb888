// src/notify/format.rs
//! Payload → Discord message. Pure; no I/O.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::truncate_chars;
use crate::ingest::types::NotificationPayload;

pub const ACCENT_COLOR: u32 = 1_942_002;
const TITLE_CAP: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

impl RenderedMessage {
    pub fn embed(&self) -> Option<&Embed> {
        self.embeds.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: String,
}

/// Posts get a linked headline; comments carry the URL as plain `<url>` content
/// (the angle brackets keep Discord from unfurling it).
pub fn render(payload: &NotificationPayload) -> RenderedMessage {
    let author = payload.author.as_ref().map(|a| EmbedAuthor {
        name: a.display_name.clone(),
        url: a.profile_url.clone(),
    });
    let timestamp = payload
        .created_utc
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339());

    let (title, url, content) = match &payload.title {
        Some(t) => (
            Some(truncate_chars(t, TITLE_CAP)),
            Some(payload.url.clone()),
            None,
        ),
        None => (None, None, Some(format!("<{}>", payload.url))),
    };

    RenderedMessage {
        content,
        embeds: vec![Embed {
            description: payload.text.clone(),
            color: ACCENT_COLOR,
            title,
            url,
            author,
            timestamp,
        }],
    }
}
