use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ExtractError, truncate_snippet};
use crate::locator::EmbeddedStateBlob;

/// Extension points for inspecting intermediate pipeline state.
///
/// Observers only watch; nothing they do feeds back into extraction.
pub trait ExtractObserver {
    fn on_blob(&mut self, _url: &str, _blob: &EmbeddedStateBlob<'_>) {}
    fn on_span(&mut self, _url: &str, _key: &str, _span: &str) {}
    fn on_record_dropped(&mut self, _url: &str, _raw: &str, _error: &ExtractError) {}
    fn on_strategy(&mut self, _url: &str, _strategy: &str, _records: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExtractObserver for NoopObserver {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub blobs_located: usize,
    pub spans_extracted: usize,
    pub records_normalized: usize,
    pub records_dropped: usize,
    pub records_invalid: usize,
    pub strategy: Option<String>,
}

/// State for extracting one document. Build a fresh one per page.
pub struct ExtractContext {
    url: String,
    pub stats: ExtractStats,
    observer: Box<dyn ExtractObserver>,
}

impl ExtractContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_observer(url, Box::new(NoopObserver))
    }

    pub fn with_observer(url: impl Into<String>, observer: Box<dyn ExtractObserver>) -> Self {
        Self {
            url: url.into(),
            stats: ExtractStats::default(),
            observer,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn blob_located(&mut self, blob: &EmbeddedStateBlob<'_>) {
        self.stats.blobs_located += 1;
        debug!(
            url = %self.url,
            pattern = blob.pattern.id(),
            script = blob.script_index,
            len = blob.text.len(),
            "embedded state located"
        );
        self.observer.on_blob(&self.url, blob);
    }

    pub(crate) fn span_extracted(&mut self, key: &str, span: &str) {
        self.stats.spans_extracted += 1;
        debug!(url = %self.url, key, len = span.len(), "span extracted");
        self.observer.on_span(&self.url, key, span);
    }

    pub(crate) fn record_normalized(&mut self) {
        self.stats.records_normalized += 1;
    }

    pub(crate) fn record_dropped(&mut self, raw: &str, error: &ExtractError) {
        self.stats.records_dropped += 1;
        warn!(
            url = %self.url,
            error = %error,
            raw = %truncate_snippet(raw),
            "dropped object literal"
        );
        self.observer.on_record_dropped(&self.url, raw, error);
    }

    pub(crate) fn record_invalid(&mut self, error: &ExtractError) {
        self.stats.records_invalid += 1;
        debug!(url = %self.url, error = %error, "discarded assembled record");
    }

    pub(crate) fn strategy_outcome(&mut self, strategy: &str, records: usize) {
        debug!(url = %self.url, strategy, records, "strategy finished");
        if records > 0 && self.stats.strategy.is_none() {
            self.stats.strategy = Some(strategy.to_string());
        }
        self.observer.on_strategy(&self.url, strategy, records);
    }
}

/// Writes located blobs, key spans and dropped literals to numbered files.
pub struct DumpObserver {
    dir: PathBuf,
    seq: usize,
}

impl DumpObserver {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create dump dir {}", dir.display()))?;
        Ok(Self { dir, seq: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn dump(&mut self, url: &str, kind: &str, body: &str) {
        self.seq += 1;
        let name = format!("{}_{:04}_{kind}.txt", url_slug(url), self.seq);
        let path = self.dir.join(name);
        if let Err(err) = fs::write(&path, body) {
            warn!(path = %path.display(), error = %err, "debug dump write failed");
        }
    }
}

impl ExtractObserver for DumpObserver {
    fn on_blob(&mut self, url: &str, blob: &EmbeddedStateBlob<'_>) {
        let kind = format!("blob_{}", blob.pattern.id());
        self.dump(url, &kind, blob.text);
    }

    fn on_span(&mut self, url: &str, key: &str, span: &str) {
        self.dump(url, &format!("span_{key}"), span);
    }

    fn on_record_dropped(&mut self, url: &str, raw: &str, error: &ExtractError) {
        self.dump(url, "dropped", &format!("{error}\n\n{raw}"));
    }
}

fn url_slug(url: &str) -> String {
    let tail = url
        .trim_end_matches('/')
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("page");
    let slug: String = tail
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(48)
        .collect();
    if slug.is_empty() { "page".to_string() } else { slug }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_uses_last_path_segment() {
        assert_eq!(url_slug("https://www.dongqiudi.com/team/50000716.html"), "50000716_html");
        assert_eq!(url_slug("https://example.com/"), "example_com");
        assert_eq!(url_slug(""), "page");
    }

    #[test]
    fn strategy_recorded_once_it_yields() {
        let mut ctx = ExtractContext::new("mem://x");
        ctx.strategy_outcome("nuxt_members", 0);
        assert_eq!(ctx.stats.strategy, None);
        ctx.strategy_outcome("json_ld", 3);
        ctx.strategy_outcome("dom", 5);
        assert_eq!(ctx.stats.strategy.as_deref(), Some("json_ld"));
    }
}
