// tests/dedup_concurrency.rs
use std::sync::Arc;

use reddit_relay::{Allowlist, IngestFilter, KnownAuthor, RawItem, SeenCache};

fn item(id: &str) -> RawItem {
    RawItem {
        id: id.into(),
        author: "JagexAsh".into(),
        body: "race".into(),
        permalink: format!("/r/x/{id}"),
        title: None,
        created_utc: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_id_from_two_streams_yields_one_payload() {
    let al = Allowlist::new(vec![KnownAuthor::new("JagexAsh", "Mod Ash")]);
    let filter = IngestFilter::new(Arc::new(al), Arc::new(SeenCache::unbounded()));

    let ids: Vec<String> = (0..500).map(|i| format!("t1_{i}")).collect();
    let ids = Arc::new(ids);

    let spawn_side = |filter: IngestFilter, ids: Arc<Vec<String>>| {
        tokio::spawn(async move {
            let mut accepted = 0usize;
            for id in ids.iter() {
                if filter.process(item(id)).is_ok() {
                    accepted += 1;
                }
                tokio::task::yield_now().await;
            }
            accepted
        })
    };

    let comments = spawn_side(filter.clone(), ids.clone());
    let posts = spawn_side(filter.clone(), ids.clone());
    let total = comments.await.unwrap() + posts.await.unwrap();

    assert_eq!(total, 500);
    assert_eq!(filter.seen_cache().len(), 500);
}
