// src/ingest/mod.rs
pub mod allowlist;
pub mod dedup;
pub mod providers;
pub mod stream;
pub mod types;

use crate::ingest::allowlist::Allowlist;
use crate::ingest::dedup::SeenCache;
use crate::ingest::types::{NotificationPayload, RawItem};
use metrics::{counter, gauge};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Body length cap, in characters, leaving headroom under Discord's 2000 limit.
pub const BODY_CAP: usize = 1950;
pub const REDDIT_BASE: &str = "https://www.reddit.com";

/// Strip literal tags, decode HTML entities, trim, then cap the length.
pub fn normalize_body(s: &str) -> String {
    // Tags go first so entity-encoded brackets (`&lt;3`) survive as text.
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| {
        regex::Regex::new(concat!(
            r"(?i)</?(?:a|b|i|u|s|p|br|hr|em|strong|del|sup|sub|span|div|code|pre|blockquote|ul|ol|li|h[1-6]|table|thead|tbody|tr|th|td)",
            r#"(?:\s+[a-z][a-z0-9-]*\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>]+))*\s*/?>"#,
        ))
        .unwrap()
    });
    let stripped = re_tags.replace_all(s, "");

    let decoded = html_escape::decode_html_entities(&stripped);
    truncate_chars(decoded.trim(), BODY_CAP)
}

/// Keep at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

pub fn canonical_url(permalink: &str) -> String {
    if permalink.starts_with("https://") || permalink.starts_with("http://") {
        permalink.to_string()
    } else if permalink.starts_with('/') {
        format!("{REDDIT_BASE}{permalink}")
    } else {
        format!("{REDDIT_BASE}/{permalink}")
    }
}

/// Why an item did not become a payload. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Malformed,
    UnknownAuthor,
    Duplicate,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed",
            Rejection::UnknownAuthor => "unknown_author",
            Rejection::Duplicate => "duplicate",
        }
    }
}

/// Allowlist check, dedup, normalization. Cheap checks run first.
#[derive(Clone)]
pub struct IngestFilter {
    allowlist: Arc<Allowlist>,
    seen: Arc<SeenCache>,
}

impl IngestFilter {
    pub fn new(allowlist: Arc<Allowlist>, seen: Arc<SeenCache>) -> Self {
        crate::metrics::ensure_described();
        Self { allowlist, seen }
    }

    pub fn allowlist(&self) -> &Arc<Allowlist> {
        &self.allowlist
    }

    pub fn seen_cache(&self) -> &Arc<SeenCache> {
        &self.seen
    }

    pub fn process(&self, item: RawItem) -> Result<NotificationPayload, Rejection> {
        let verdict = self.evaluate(item);
        let label = match &verdict {
            Ok(_) => "accepted",
            Err(r) => r.as_str(),
        };
        counter!("ingest_items_total", "verdict" => label).increment(1);
        verdict
    }

    fn evaluate(&self, item: RawItem) -> Result<NotificationPayload, Rejection> {
        if item.id.trim().is_empty() || item.author.trim().is_empty() {
            return Err(Rejection::Malformed);
        }

        // Unknown authors never touch the cache.
        let author_key = item.author.to_lowercase();
        if !self.allowlist.is_known(&author_key) {
            return Err(Rejection::UnknownAuthor);
        }

        if !self.seen.check_and_mark(&item.id) {
            return Err(Rejection::Duplicate);
        }
        gauge!("ingest_seen_ids").set(self.seen.len() as f64);

        let text = normalize_body(&item.body);
        let author = self.allowlist.lookup(&author_key).cloned();

        tracing::debug!(
            target: "ingest",
            id = %item.id,
            kind = item.kind().as_str(),
            author = %item.author,
            "accepted item"
        );

        Ok(NotificationPayload {
            text,
            url: canonical_url(&item.permalink),
            title: item.title,
            author,
            created_utc: item.created_utc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::allowlist::KnownAuthor;

    fn filter() -> IngestFilter {
        let al = Allowlist::new(vec![KnownAuthor::new("JagexAsh", "Mod Ash")]);
        IngestFilter::new(Arc::new(al), Arc::new(SeenCache::unbounded()))
    }

    fn comment(id: &str, author: &str, body: &str) -> RawItem {
        RawItem {
            id: id.into(),
            author: author.into(),
            body: body.into(),
            permalink: format!("/r/2007scape/comments/x/y/{id}/"),
            title: None,
            created_utc: None,
        }
    }

    #[test]
    fn normalize_strips_tags_and_decodes() {
        assert_eq!(normalize_body("<b>Hi</b> &amp; welcome"), "Hi & welcome");
        assert_eq!(
            normalize_body(r#"<a href="https://redd.it/x">link</a><br/>"#),
            "link"
        );
        assert_eq!(normalize_body("  a &lt;3 b  "), "a <3 b");
        assert_eq!(normalize_body(""), "");
    }

    #[test]
    fn truncation_counts_chars_after_decoding() {
        // 1950 encoded ampersands decode to 1950 characters: nothing is cut.
        let encoded = "&amp;".repeat(BODY_CAP);
        let out = normalize_body(&encoded);
        assert_eq!(out.chars().count(), BODY_CAP);
        assert!(out.chars().all(|c| c == '&'));

        let long = "é".repeat(BODY_CAP + 50);
        assert_eq!(normalize_body(&long).chars().count(), BODY_CAP);
    }

    #[test]
    fn canonical_url_variants() {
        assert_eq!(canonical_url("/r/x/abc"), "https://www.reddit.com/r/x/abc");
        assert_eq!(canonical_url("r/x/abc"), "https://www.reddit.com/r/x/abc");
        assert_eq!(canonical_url("https://redd.it/abc"), "https://redd.it/abc");
    }

    #[test]
    fn unknown_author_leaves_cache_untouched() {
        let f = filter();
        let out = f.process(comment("c1", "SomeoneElse", "hello"));
        assert_eq!(out, Err(Rejection::UnknownAuthor));
        assert!(f.seen_cache().is_empty());
    }

    #[test]
    fn malformed_items_are_dropped_before_cache() {
        let f = filter();
        assert_eq!(f.process(comment("", "JagexAsh", "x")), Err(Rejection::Malformed));
        assert_eq!(f.process(comment("c2", " ", "x")), Err(Rejection::Malformed));
        assert!(f.seen_cache().is_empty());
    }

    #[test]
    fn known_author_passes_once() {
        let f = filter();
        let p = f.process(comment("c3", "jagexash", "gz")).unwrap();
        assert_eq!(p.author.unwrap().display_name, "Mod Ash");
        assert!(f.seen_cache().seen("c3"));
        assert_eq!(
            f.process(comment("c3", "JagexAsh", "gz")),
            Err(Rejection::Duplicate)
        );
    }
}
