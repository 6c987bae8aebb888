// src/bootstrap.rs
use crate::config::RelayConfig;
use crate::ingest::allowlist::load_allowlist;
use crate::ingest::dedup::SeenCache;
use crate::ingest::providers::reddit::{Feed, RedditCredentials, RedditSession, RedditSource};
use crate::ingest::stream::spawn_stream;
use crate::ingest::types::ItemSource;
use crate::ingest::IngestFilter;
use crate::notify::discord::DiscordSender;
use crate::notify::{DestinationSender, Dispatcher};
use crate::relay::Relay;
use crate::tenants::StaticTenants;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A wired relay plus the sources it will poll.
pub struct RelayRuntime {
    pub relay: Arc<Relay>,
    pub tenants: Arc<StaticTenants>,
    sources: Vec<(Arc<dyn ItemSource>, Duration)>,
}

impl RelayRuntime {
    /// Build from config with explicit sender and sources.
    pub fn build(
        cfg: &RelayConfig,
        sender: Arc<dyn DestinationSender>,
        sources: Vec<(Arc<dyn ItemSource>, Duration)>,
    ) -> anyhow::Result<Self> {
        let allowlist = load_allowlist(cfg.authors_path.as_deref()).context("loading allowlist")?;
        if allowlist.is_empty() {
            warn!("allowlist is empty; every item will be dropped");
        }
        let seen = Arc::new(SeenCache::with_capacity(cfg.dedup.capacity));
        let tenants = Arc::new(StaticTenants::from_config(&cfg.tenants));
        info!(
            authors = allowlist.len(),
            tenants = tenants.len(),
            configured = tenants.configured(),
            dedup_capacity = cfg.dedup.capacity,
            sender = sender.name(),
            "relay wired"
        );

        let filter = IngestFilter::new(Arc::new(allowlist), seen);
        let dispatcher = Dispatcher::new(tenants.clone(), sender)
            .with_timeout(cfg.delivery.timeout())
            .with_max_concurrent(cfg.delivery.max_concurrent);

        Ok(Self {
            relay: Arc::new(Relay::new(filter, dispatcher)),
            tenants,
            sources,
        })
    }

    /// Wire Reddit + Discord from the environment. `Ok(None)` when credentials
    /// are missing: logged once, not fatal.
    pub fn from_env(cfg: &RelayConfig) -> anyhow::Result<Option<Self>> {
        let Some(creds) = RedditCredentials::from_env() else {
            warn!("Disabling reddit relay because there are no reddit credentials");
            return Ok(None);
        };
        let Some(discord) = DiscordSender::from_env() else {
            warn!("Disabling reddit relay because DISCORD_TOKEN is not set");
            return Ok(None);
        };

        let session = Arc::new(RedditSession::new(creds, &cfg.reddit.user_agent)?);
        let r = &cfg.reddit;
        let comments: Arc<dyn ItemSource> = Arc::new(RedditSource::new(
            session.clone(),
            &r.subreddit,
            Feed::Comments,
            r.comments.limit,
        ));
        let posts: Arc<dyn ItemSource> =
            Arc::new(RedditSource::new(session, &r.subreddit, Feed::Posts, r.posts.limit));
        let sources = vec![
            (comments, r.comments.poll_interval()),
            (posts, r.posts.poll_interval()),
        ];

        let sender = Arc::new(discord.with_timeout(cfg.delivery.timeout()));
        Self::build(cfg, sender, sources).map(Some)
    }

    /// Start polling every source and run the relay in the background.
    pub fn spawn(self) -> JoinHandle<()> {
        let streams = self
            .sources
            .into_iter()
            .map(|(source, every)| spawn_stream(source, every))
            .collect();
        let relay = self.relay;
        tokio::spawn(async move { relay.run(streams).await })
    }
}
