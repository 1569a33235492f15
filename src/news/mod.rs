//! Candidate item fetching for the news digest.
//!
//! Feeds are polled concurrently; a failing feed logs and contributes
//! nothing. Extraction handles both RSS 2.0 `<item>` and Atom `<entry>`
//! payloads well enough for the feeds this tool follows; it is not a
//! general feed parser.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::config::FeedConfig;
use crate::store::Keyed;

const SUMMARY_MAX_CHARS: usize = 300;
const FETCH_TIMEOUT_SECS: u64 = 30;

/// A candidate digest item. The canonical link doubles as the dedup key.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Canonical link, used as the dedup key.
    pub key: String,
    pub title: String,
    pub summary: Option<String>,
    pub source_tag: String,
}

impl Keyed for Item {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Assembles the list of candidate items for a digest.
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<Vec<Item>>;
}

/// Item source polling a configured set of RSS/Atom feeds.
pub struct RssSource {
    client: reqwest::Client,
    feeds: Vec<FeedConfig>,
    max_per_source: usize,
}

impl RssSource {
    pub fn new(feeds: Vec<FeedConfig>, max_per_source: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0 (compatible; concierge-daemon)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            feeds,
            max_per_source,
        }
    }

    async fn fetch_feed(&self, feed: &FeedConfig) -> anyhow::Result<Vec<Item>> {
        let response = self.client.get(&feed.url).send().await?.error_for_status()?;
        let body = response.text().await?;
        Ok(extract_items(&body, &feed.tag, self.max_per_source))
    }
}

#[async_trait]
impl ItemSource for RssSource {
    async fn fetch(&self) -> anyhow::Result<Vec<Item>> {
        let fetches = self.feeds.iter().map(|feed| async move {
            match self.fetch_feed(feed).await {
                Ok(items) => {
                    tracing::debug!("{}: {} items", feed.tag, items.len());
                    items
                }
                Err(e) => {
                    tracing::warn!("{}: feed fetch failed: {}", feed.tag, e);
                    Vec::new()
                }
            }
        });
        let results = futures::future::join_all(fetches).await;
        Ok(results.into_iter().flatten().collect())
    }
}

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<(item|entry)[\s>].*?</(?:item|entry)>").unwrap())
}

fn field_re(tag: &'static str, cell: &'static OnceLock<Regex>) -> &'static Regex {
    cell.get_or_init(move || {
        Regex::new(&format!(r"(?s)<{tag}[^>]*>(.*?)</{tag}>")).unwrap()
    })
}

fn atom_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<link[^>]*href\s*=\s*"([^"]+)""#).unwrap())
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// Pull items out of a feed payload, capped at `max` per source.
pub fn extract_items(xml: &str, source_tag: &str, max: usize) -> Vec<Item> {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    static LINK: OnceLock<Regex> = OnceLock::new();
    static DESCRIPTION: OnceLock<Regex> = OnceLock::new();
    static SUMMARY: OnceLock<Regex> = OnceLock::new();

    entry_re()
        .find_iter(xml)
        .take(max)
        .filter_map(|m| {
            let block = m.as_str();
            let title = field_re("title", &TITLE)
                .captures(block)
                .map(|c| clean_text(&c[1]))?;
            let link = extract_link(block, &LINK)?;
            let summary = field_re("description", &DESCRIPTION)
                .captures(block)
                .or_else(|| field_re("summary", &SUMMARY).captures(block))
                .map(|c| truncate(&clean_text(&c[1]), SUMMARY_MAX_CHARS))
                .filter(|s| !s.is_empty());
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(Item {
                key: link,
                title,
                summary,
                source_tag: source_tag.to_string(),
            })
        })
        .collect()
}

fn extract_link(block: &str, rss_cell: &'static OnceLock<Regex>) -> Option<String> {
    // RSS 2.0 puts the URL in the element body; Atom uses an href attribute.
    if let Some(c) = field_re("link", rss_cell).captures(block) {
        let text = clean_text(&c[1]);
        if !text.is_empty() {
            return Some(text);
        }
    }
    atom_link_re()
        .captures(block)
        .map(|c| c[1].trim().to_string())
}

fn clean_text(raw: &str) -> String {
    let raw = raw
        .trim()
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(raw.trim());
    // Decode the common entities first: feeds often ship HTML markup
    // entity-encoded, and it must become literal before tags are stripped.
    let decoded = raw
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let stripped = html_tag_re().replace_all(&decoded, "");
    stripped.replace("&amp;", "&").trim().to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

/// Build the summarization prompt for a batch of new items.
pub fn digest_prompt(items: &[Item]) -> String {
    let mut prompt = String::from(
        "Summarize the following news items into a short morning digest. \
         Group related stories, lead with the most significant, and keep \
         the whole digest under 300 words. Plain text only.\n\n",
    );
    for item in items {
        prompt.push_str(&format!("- [{}] {}\n", item.source_tag, item.title));
        if let Some(summary) = &item.summary {
            prompt.push_str(&format!("  {}\n", summary));
        }
    }
    prompt
}
