// tests/e2e_relay.rs
//
// Full path: streams → filter → formatter → fanout, with in-memory sources and sender.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reddit_relay::ingest::stream::spawn_stream;
use reddit_relay::ingest::types::ItemSource;
use reddit_relay::notify::recording::RecordingSender;
use reddit_relay::tenants::StaticTenants;
use reddit_relay::{
    Allowlist, Destination, Dispatcher, IngestFilter, KnownAuthor, RawItem, Relay, SeenCache,
    TenantId,
};

fn greeting() -> RawItem {
    RawItem {
        id: "abc".into(),
        author: "JagexAsh".into(),
        body: "<b>Hi</b> &amp; welcome".into(),
        permalink: "/r/x/abc".into(),
        title: None,
        created_utc: None,
    }
}

fn relay_with(tenants: &[(&str, Option<&str>)], sender: Arc<RecordingSender>) -> Relay {
    let allowlist = Allowlist::new(vec![KnownAuthor::new("JagexAsh", "Mod Ash")]);
    let filter = IngestFilter::new(Arc::new(allowlist), Arc::new(SeenCache::unbounded()));
    let dir = Arc::new(StaticTenants::new());
    for (t, c) in tenants {
        dir.set_destination(TenantId(t.to_string()), c.map(|c| Destination(c.to_string())));
    }
    Relay::new(filter, Dispatcher::new(dir, sender))
}

#[tokio::test]
async fn known_author_reaches_every_configured_tenant_once() {
    let sender = Arc::new(RecordingSender::new());
    let relay = relay_with(
        &[("g1", Some("101")), ("g2", Some("102")), ("g3", None)],
        sender.clone(),
    );

    let report = relay.ingest(greeting()).expect("accepted").await.unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(report.skipped, 1);

    for (_, msg) in sender.sent() {
        assert_eq!(msg.content.as_deref(), Some("<https://www.reddit.com/r/x/abc>"));
        let embed = msg.embed().unwrap();
        assert_eq!(embed.description, "Hi & welcome");
        let byline = embed.author.as_ref().unwrap();
        assert_eq!(byline.name, "Mod Ash");
        assert_eq!(byline.url, "https://www.reddit.com/user/JagexAsh");
    }

    // Replay: nothing further goes out.
    assert!(relay.ingest(greeting()).is_none());
    assert_eq!(sender.count(), 2);
    assert_eq!(relay.snapshot().duplicate, 1);
}

struct OneShot {
    name: &'static str,
    items: Vec<RawItem>,
    done: AtomicBool,
}

#[async_trait]
impl ItemSource for OneShot {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self.items.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

struct Unreachable;

#[async_trait]
impl ItemSource for Unreachable {
    async fn connect(&self) -> Result<()> {
        Err(anyhow!("dns error"))
    }

    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

#[tokio::test]
async fn dead_stream_does_not_stop_the_live_one() {
    let sender = Arc::new(RecordingSender::new());
    let relay = Arc::new(relay_with(&[("g1", Some("101"))], sender.clone()));

    let mut post = greeting();
    post.id = "t3_p".into();
    post.permalink = "/r/x/comments/p/".into();
    post.title = Some("Game update".into());

    let live = Arc::new(OneShot {
        name: "comments",
        // Same comment twice in one page plus a post.
        items: vec![greeting(), greeting(), post],
        done: AtomicBool::new(false),
    });
    let streams = vec![
        spawn_stream(Arc::new(Unreachable), Duration::from_millis(5)),
        spawn_stream(live, Duration::from_millis(5)),
    ];

    let runner = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.run(streams).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while sender.count() < 2 || relay.snapshot().stream_errors < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both payloads delivered");
    runner.abort();

    let snap = relay.snapshot();
    assert_eq!(snap.accepted, 2);
    assert_eq!(snap.duplicate, 1);
    assert_eq!(snap.stream_errors, 1);
    assert_eq!(sender.count(), 2);

    let titled = sender
        .sent()
        .into_iter()
        .filter_map(|(_, m)| m.embed().and_then(|e| e.title.clone()))
        .collect::<Vec<_>>();
    assert_eq!(titled, vec!["Game update".to_string()]);
}
