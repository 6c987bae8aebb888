// src/ingest/allowlist.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "RELAY_AUTHORS_PATH";
pub const PROFILE_BASE: &str = "https://www.reddit.com/user/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownAuthor {
    pub username: String,
    pub display_name: String,
    pub profile_url: String,
}

impl KnownAuthor {
    /// Author with the default Reddit profile link.
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        let username = username.into();
        let profile_url = format!("{PROFILE_BASE}{username}");
        Self {
            username,
            display_name: display_name.into(),
            profile_url,
        }
    }
}

/// Known authors keyed by lowercased username. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    by_name: HashMap<String, KnownAuthor>,
}

impl Allowlist {
    /// Blank usernames are skipped; on case-insensitive duplicates the first entry wins.
    pub fn new(authors: impl IntoIterator<Item = KnownAuthor>) -> Self {
        let mut by_name = HashMap::new();
        for author in authors {
            let key = author.username.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            by_name.entry(key).or_insert(author);
        }
        Self { by_name }
    }

    pub fn is_known(&self, author: &str) -> bool {
        self.by_name.contains_key(&author.to_lowercase())
    }

    pub fn lookup(&self, author: &str) -> Option<&KnownAuthor> {
        self.by_name.get(&author.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Load the allowlist from an explicit path. Supports TOML or JSON formats.
pub fn load_allowlist_from(path: &Path) -> Result<Allowlist> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading authors from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let entries = parse_authors(&content, ext.as_str())
        .with_context(|| format!("parsing authors from {}", path.display()))?;
    Ok(Allowlist::new(entries))
}

/// Load the allowlist using env var + fallbacks:
/// 1) $RELAY_AUTHORS_PATH
/// 2) `configured` (the `authors_path` config key)
/// 3) config/authors.toml
/// 4) config/authors.json
///
/// Nothing found means an empty allowlist.
pub fn load_allowlist(configured: Option<&Path>) -> Result<Allowlist> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_allowlist_from(&pb);
        } else {
            return Err(anyhow!("RELAY_AUTHORS_PATH points to non-existent path"));
        }
    }
    if let Some(p) = configured {
        return load_allowlist_from(p);
    }
    let toml_p = PathBuf::from("config/authors.toml");
    if toml_p.exists() {
        return load_allowlist_from(&toml_p);
    }
    let json_p = PathBuf::from("config/authors.json");
    if json_p.exists() {
        return load_allowlist_from(&json_p);
    }
    Ok(Allowlist::default())
}

#[derive(Debug, Deserialize)]
struct AuthorEntry {
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    profile_url: Option<String>,
}

impl AuthorEntry {
    fn into_known(self) -> Option<KnownAuthor> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return None;
        }
        let display_name = self
            .display_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| username.clone());
        let mut author = KnownAuthor::new(username, display_name);
        if let Some(url) = self.profile_url.filter(|u| !u.trim().is_empty()) {
            author.profile_url = url.trim().to_string();
        }
        Some(author)
    }
}

fn parse_authors(s: &str, hint_ext: &str) -> Result<Vec<KnownAuthor>> {
    let try_toml = hint_ext == "toml" || s.contains("[[authors]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported authors format"))
}

fn parse_toml(s: &str) -> Result<Vec<KnownAuthor>> {
    #[derive(Deserialize)]
    struct TomlAuthors {
        authors: Vec<AuthorEntry>,
    }
    let v: TomlAuthors = toml::from_str(s)?;
    Ok(v.authors.into_iter().filter_map(AuthorEntry::into_known).collect())
}

fn parse_json(s: &str) -> Result<Vec<KnownAuthor>> {
    let v: Vec<AuthorEntry> = serde_json::from_str(s)?;
    Ok(v.into_iter().filter_map(AuthorEntry::into_known).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let al = Allowlist::new(vec![KnownAuthor::new("JagexAsh", "Mod Ash")]);
        assert!(al.is_known("jagexash"));
        assert!(al.is_known("JAGEXASH"));
        assert!(!al.is_known("JagexAshley"));
        let found = al.lookup("jAgExAsH").unwrap();
        assert_eq!(found.username, "JagexAsh");
        assert_eq!(found.profile_url, "https://www.reddit.com/user/JagexAsh");
    }

    #[test]
    fn first_entry_wins_and_blanks_are_dropped() {
        let al = Allowlist::new(vec![
            KnownAuthor::new("JagexAsh", "Mod Ash"),
            KnownAuthor::new("jagexash", "Impostor"),
            KnownAuthor::new("  ", "Nobody"),
        ]);
        assert_eq!(al.len(), 1);
        assert_eq!(al.lookup("JagexAsh").unwrap().display_name, "Mod Ash");
    }

    #[test]
    fn toml_and_json_formats_parse() {
        let toml = r#"
[[authors]]
username = " JagexAsh "
display_name = "Mod Ash"

[[authors]]
username = "JagexGoblin"

[[authors]]
username = ""
"#;
        let out = parse_authors(toml, "toml").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].username, "JagexAsh");
        assert_eq!(out[1].display_name, "JagexGoblin");

        let json = r#"[{"username":"JagexKieren","profile_url":"https://example.test/k"}]"#;
        let out = parse_authors(json, "json").unwrap();
        assert_eq!(out[0].profile_url, "https://example.test/k");
        assert_eq!(out[0].display_name, "JagexKieren");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_authors("not = [valid", "").is_err());
    }
}
