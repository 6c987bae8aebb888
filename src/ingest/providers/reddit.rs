// src/ingest/providers/reddit.rs
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::ingest::types::{ItemSource, RawItem};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
pub const DEFAULT_USER_AGENT: &str = "reddit-relay/0.1 (subreddit notifications)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Comments,
    Posts,
}

impl Feed {
    fn listing_path(self) -> &'static str {
        match self {
            Feed::Comments => "comments",
            Feed::Posts => "new",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Feed::Comments => "comments",
            Feed::Posts => "posts",
        }
    }
}

/// Script-app credentials for the OAuth2 password grant.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl RedditCredentials {
    /// All four of REDDIT_CLIENT_ID / _SECRET / _USERNAME / _PASSWORD, or nothing.
    pub fn from_env() -> Option<Self> {
        let get = |k: &str| {
            std::env::var(k)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Some(Self {
            client_id: get("REDDIT_CLIENT_ID")?,
            client_secret: get("REDDIT_CLIENT_SECRET")?,
            username: get("REDDIT_USERNAME")?,
            password: get("REDDIT_PASSWORD")?,
        })
    }
}

// Never print secrets.
impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// One authenticated HTTP session, shared by the comment and post sources.
pub struct RedditSession {
    http: Client,
    creds: RedditCredentials,
    token: Mutex<Option<AccessToken>>,
}

impl RedditSession {
    pub fn new(creds: RedditCredentials, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .context("building reddit http client")?;
        Ok(Self {
            http,
            creds,
            token: Mutex::new(None),
        })
    }

    /// Cached bearer token, refreshed when expired.
    async fn bearer(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(tok) = guard.as_ref() {
            if tok.expires_at > Instant::now() {
                return Ok(tok.value.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<AccessToken> {
        let form = [
            ("grant_type", "password"),
            ("username", self.creds.username.as_str()),
            ("password", self.creds.password.as_str()),
        ];
        let body: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.creds.client_id, Some(&self.creds.client_secret))
            .form(&form)
            .send()
            .await
            .context("reddit token request")?
            .error_for_status()
            .context("reddit token non-2xx")?
            .json()
            .await
            .context("reddit token json")?;

        if let Some(err) = body.error {
            bail!("reddit token error: {err}");
        }
        let value = body
            .access_token
            .ok_or_else(|| anyhow!("reddit token response missing access_token"))?;
        // Refresh a minute early.
        let ttl = body.expires_in.unwrap_or(3600).saturating_sub(60);
        tracing::info!(target: "stream", ttl_secs = ttl, "reddit access token acquired");
        Ok(AccessToken {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }

    async fn get_listing(&self, subreddit: &str, feed: Feed, limit: u32) -> Result<String> {
        let token = self.bearer().await?;
        let url = format!("{API_BASE}/r/{subreddit}/{}", feed.listing_path());
        let rsp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("limit", limit)])
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        if rsp.status() == StatusCode::UNAUTHORIZED {
            // Force a fresh token on the next tick.
            self.token.lock().await.take();
        }
        rsp.error_for_status()
            .with_context(|| format!("GET {url} non-2xx"))?
            .text()
            .await
            .context("reading reddit listing body")
    }
}

pub struct RedditSource {
    session: Arc<RedditSession>,
    subreddit: String,
    feed: Feed,
    limit: u32,
}

impl RedditSource {
    pub fn new(session: Arc<RedditSession>, subreddit: &str, feed: Feed, limit: u32) -> Self {
        Self {
            session,
            subreddit: subreddit.trim_start_matches("r/").to_string(),
            feed,
            limit,
        }
    }
}

#[async_trait]
impl ItemSource for RedditSource {
    async fn connect(&self) -> Result<()> {
        self.session.bearer().await.map(|_| ())
    }

    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let t0 = Instant::now();
        let body = self
            .session
            .get_listing(&self.subreddit, self.feed, self.limit)
            .await?;
        let items = parse_listing(&body)?;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("stream_fetch_ms", "stream" => self.feed.name()).record(ms);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        self.feed.name()
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: ThingData,
}

#[derive(Debug, Default, Deserialize)]
struct ThingData {
    id: Option<String>,
    author: Option<String>,
    body: Option<String>,
    selftext: Option<String>,
    permalink: Option<String>,
    title: Option<String>,
    created_utc: Option<f64>,
}

/// Parse a listing (`t1` comments or `t3` posts) into raw items, oldest first.
/// Children without an id, author, or permalink are skipped.
pub fn parse_listing(json: &str) -> Result<Vec<RawItem>> {
    let listing: Listing = serde_json::from_str(json).context("parsing reddit listing json")?;

    let mut out = Vec::with_capacity(listing.data.children.len());
    for thing in listing.data.children {
        let d = thing.data;
        let (Some(id), Some(author), Some(permalink)) = (d.id, d.author, d.permalink) else {
            continue;
        };
        let (body, title) = match thing.kind.as_str() {
            "t1" => (d.body.unwrap_or_default(), None),
            "t3" => match d.title {
                Some(title) => (d.selftext.unwrap_or_default(), Some(title)),
                None => continue,
            },
            _ => continue,
        };
        out.push(RawItem {
            id,
            author,
            body,
            permalink,
            title,
            created_utc: d.created_utc.map(|t| t as i64),
        });
    }
    // Listings are newest first.
    out.reverse();
    Ok(out)
}
