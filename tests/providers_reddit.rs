// tests/providers_reddit.rs
use reddit_relay::ingest::providers::reddit::parse_listing;
use reddit_relay::ingest::types::ItemKind;

#[test]
fn comments_fixture_parses_and_skips_authorless() {
    let json = include_str!("fixtures/reddit_comments.json");
    let items = parse_listing(json).expect("parse comments");

    // k9zzz03 has no author and is dropped; the rest come back oldest first.
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "k9zzz02");
    assert_eq!(items[0].author, "[deleted]");
    assert_eq!(items[1].id, "k9zzz01");
    assert_eq!(items[1].kind(), ItemKind::Comment);
    // Raw body is left encoded; decoding is the filter's job.
    assert_eq!(items[1].body, "It&#39;s intended &amp; will stay that way.");
    assert_eq!(items[1].created_utc, Some(1_700_000_300));
}

#[test]
fn posts_fixture_carries_titles() {
    let json = include_str!("fixtures/reddit_posts.json");
    let items = parse_listing(json).expect("parse posts");

    assert_eq!(items.len(), 2);
    let update = items.iter().find(|i| i.id == "17abc99").unwrap();
    assert_eq!(update.kind(), ItemKind::Post);
    assert_eq!(
        update.title.as_deref(),
        Some("Game update: Varlamore &amp; more")
    );
    assert_eq!(update.body, "Read the &lt;full&gt; notes below.");
    assert_eq!(
        update.permalink,
        "/r/2007scape/comments/17abc99/game_update_varlamore_more/"
    );
}
