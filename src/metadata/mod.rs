//! Off-loop link-preview resolver. Workers pull URL-bearing post text off a
//! bounded queue, fetch a short timeout's worth of HTML, and report
//! OpenGraph/Twitter-card metadata back to the Engine. Never blocks the
//! Engine: a full queue silently drops the work item, and resolver failures
//! are silent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::core::constants::{RESOLVER_QUEUE_DEPTH, RESOLVER_TIMEOUT_SECS, RESOLVER_WORKER_COUNT};
use crate::core::shutdown::ShutdownService;
use crate::engine::{EngineHandle, Metadata, now_ns};

/// Unit of work: the posted message id and the raw text it came from.
pub struct MetadataWork {
    pub message_id: String,
    pub text: String,
}

pub fn work_channel() -> (mpsc::Sender<MetadataWork>, mpsc::Receiver<MetadataWork>) {
    mpsc::channel(RESOLVER_QUEUE_DEPTH)
}

/// Spawn [`RESOLVER_WORKER_COUNT`] worker tasks sharing one bounded queue.
pub async fn spawn_workers(
    rx: mpsc::Receiver<MetadataWork>,
    engine: EngineHandle,
    shutdown: &ShutdownService,
) {
    let rx = Arc::new(Mutex::new(rx));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(RESOLVER_TIMEOUT_SECS))
        .build()
        .expect("failed to build resolver http client");

    for _ in 0..RESOLVER_WORKER_COUNT {
        let rx = rx.clone();
        let client = client.clone();
        let engine = engine.clone();
        let mut shutdown_rx = shutdown.subscribe();

        let handle: JoinHandle<()> = tokio::spawn(async move {
            loop {
                let work = {
                    let mut guard = rx.lock().await;
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => None,
                        item = guard.recv() => item,
                    }
                };
                let Some(work) = work else {
                    break;
                };
                if let Some(url) = first_url(&work.text) {
                    if let Some(metadata) = resolve(&client, &url).await {
                        engine.attach_metadata(work.message_id, metadata);
                    }
                }
            }
        });
        shutdown.register(handle).await;
    }
}

fn first_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|tok| tok.starts_with("http://") || tok.starts_with("https://"))
        .map(str::to_string)
}

async fn resolve(client: &reqwest::Client, url: &str) -> Option<Metadata> {
    let body = client.get(url).send().await.ok()?.text().await.ok()?;
    let tags = scan_meta_tags(&body);

    let title = tags.get("title").cloned()?;
    let kind = tags.get("type").or_else(|| tags.get("card")).cloned()?;
    let image = tags.get("image").cloned()?;
    let resolved_url = tags.get("url").cloned().unwrap_or_else(|| url.to_string());

    Some(Metadata {
        created: now_ns(),
        title,
        description: tags.get("description").cloned().unwrap_or_default(),
        kind,
        image,
        url: resolved_url,
        site: tags.get("site").or_else(|| tags.get("site_name")).cloned().unwrap_or_default(),
    })
}

/// Scan `<meta property="og:x" content="y">` and
/// `<meta name="twitter:x" content="y">` tags, normalizing keys by stripping
/// the `og:`/`twitter:` prefix. Intentionally not a full HTML parser — just
/// enough to pull preview data out of well-formed pages.
fn scan_meta_tags(html: &str) -> HashMap<String, String> {
    static TAG_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = TAG_RE.get_or_init(|| Regex::new(r#"(?is)<meta\s+[^>]*>"#).unwrap());

    static ATTR_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let attr_re = ATTR_RE.get_or_init(|| {
        Regex::new(r#"(?is)(property|name|content)\s*=\s*["']([^"']*)["']"#).unwrap()
    });

    let mut out = HashMap::new();
    for tag_match in re.find_iter(html) {
        let mut key: Option<String> = None;
        let mut content: Option<String> = None;
        for attr in attr_re.captures_iter(tag_match.as_str()) {
            match &attr[1].to_lowercase()[..] {
                "property" | "name" => key = Some(attr[2].to_string()),
                "content" => content = Some(attr[2].to_string()),
                _ => {}
            }
        }
        if let (Some(key), Some(content)) = (key, content) {
            let normalized = key
                .trim_start_matches("og:")
                .trim_start_matches("twitter:")
                .to_string();
            out.entry(normalized).or_insert(content);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_url_finds_http_token() {
        assert_eq!(
            first_url("check this out https://example.com/page neat"),
            Some("https://example.com/page".to_string())
        );
        assert_eq!(first_url("no links here"), None);
    }

    #[test]
    fn scan_meta_tags_reads_opengraph() {
        let html = r#"
            <html><head>
            <meta property="og:title" content="Example Title">
            <meta property="og:type" content="article">
            <meta property="og:image" content="https://example.com/img.png">
            <meta name="twitter:site" content="@example">
            </head></html>
        "#;
        let tags = scan_meta_tags(html);
        assert_eq!(tags.get("title"), Some(&"Example Title".to_string()));
        assert_eq!(tags.get("type"), Some(&"article".to_string()));
        assert_eq!(tags.get("site"), Some(&"@example".to_string()));
    }
}
