//! Demo that pushes a few fake items through the relay with an in-memory sender
//! and prints what each tenant would have received.

use std::sync::Arc;

use reddit_relay::notify::recording::RecordingSender;
use reddit_relay::tenants::StaticTenants;
use reddit_relay::{
    Allowlist, Destination, Dispatcher, IngestFilter, KnownAuthor, RawItem, Relay, SeenCache,
    TenantId,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let allowlist = Allowlist::new(vec![KnownAuthor::new("JagexAsh", "Mod Ash")]);
    let filter = IngestFilter::new(Arc::new(allowlist), Arc::new(SeenCache::unbounded()));

    let tenants = Arc::new(StaticTenants::new());
    tenants.set_destination(TenantId("guild-a".into()), Some(Destination("100".into())));
    tenants.set_destination(TenantId("guild-b".into()), Some(Destination("200".into())));
    tenants.set_destination(TenantId("guild-c".into()), None);
    let sender = Arc::new(RecordingSender::new().with_failure(Destination("200".into()), 403));

    let relay = Relay::new(filter, Dispatcher::new(tenants, sender.clone()));

    let seq = [
        ("abc", "JagexAsh", "<b>Hi</b> &amp; welcome", None),
        ("abc", "JagexAsh", "<b>Hi</b> &amp; welcome", None),
        ("def", "SomePlayer", "buff pures pls", None),
        ("ghi", "jagexash", "Patch notes are up", Some("Game update: demo")),
    ];

    for (id, author, body, title) in seq {
        let item = RawItem {
            id: id.into(),
            author: author.into(),
            body: body.into(),
            permalink: format!("/r/2007scape/comments/{id}/"),
            title: title.map(str::to_string),
            created_utc: None,
        };
        if let Some(handle) = relay.ingest(item) {
            match handle.await {
                Ok(report) => println!("{id}: {report:?}"),
                Err(e) => println!("{id}: dispatch task failed: {e}"),
            }
        } else {
            println!("{id}: dropped");
        }
    }

    for (dest, msg) in sender.sent() {
        let json = serde_json::to_string_pretty(&msg).unwrap_or_default();
        println!("-> channel {dest}:\n{json}");
    }
    println!("stats: {:?}", relay.snapshot());
    println!("relay-demo done");
}
