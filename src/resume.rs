use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::sites::normalize_url;

static ENTRY_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{40,}").unwrap());
static URL_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"URL:\s*(https?://\S+)").unwrap());

/// Outcome recorded for a URL in a prior run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriorOutcome {
    Done,
    Retryable,
}

/// What to do with a candidate record this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Extracted in a prior run; excluded entirely.
    Done,
    /// Previously SKIPPED or ERROR; queued again.
    Retry,
    /// Never seen before.
    New,
}

/// Index over a category's existing artifact, keyed by normalized URL. This
/// is what makes repeated runs additive: without it every run would re-fetch
/// every record.
#[derive(Debug, Default)]
pub struct ResumeIndex {
    entries: HashMap<String, PriorOutcome>,
}

impl ResumeIndex {
    /// Read and index an artifact if it exists. An unreadable file is
    /// treated as absent (the run then re-processes everything).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::build(&text),
            Err(e) => {
                debug!("no resume state at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse artifact text into the index. Entries are delimited by runs of
    /// 40+ dashes. Within an entry, only the first non-blank line after the
    /// `URL:` line counts as a status marker; a description that happens to
    /// contain the literal text "Status: SKIPPED" must not reclassify the
    /// entry.
    pub fn build(text: &str) -> Self {
        let mut entries = HashMap::new();

        for entry in ENTRY_SPLIT_RE.split(text) {
            let Some(url) = URL_LINE_RE.captures(entry).map(|c| c[1].to_string()) else {
                continue;
            };
            let outcome = match status_marker_after_url(entry) {
                Some(_) => PriorOutcome::Retryable,
                None => PriorOutcome::Done,
            };

            let key = normalize_url(&url);
            // Once a URL is done it stays done, whatever later retries say.
            entries
                .entry(key)
                .and_modify(|prior| {
                    if outcome == PriorOutcome::Done {
                        *prior = PriorOutcome::Done;
                    }
                })
                .or_insert(outcome);
        }

        Self { entries }
    }

    /// Partition a candidate URL into exactly one disposition.
    pub fn classify(&self, url: Option<&str>) -> Disposition {
        let Some(url) = url else {
            return Disposition::New;
        };
        match self.entries.get(&normalize_url(url)) {
            Some(PriorOutcome::Done) => Disposition::Done,
            Some(PriorOutcome::Retryable) => Disposition::Retry,
            None => Disposition::New,
        }
    }

    pub fn done_count(&self) -> usize {
        self.entries.values().filter(|o| **o == PriorOutcome::Done).count()
    }

    pub fn retryable_count(&self) -> usize {
        self.entries.values().filter(|o| **o == PriorOutcome::Retryable).count()
    }
}

/// Find the status marker for an entry: the first non-blank line after the
/// `URL:` line, and only if it is a SKIPPED or ERROR marker.
fn status_marker_after_url(entry: &str) -> Option<&str> {
    let mut lines = entry.lines();
    lines.find(|l| l.trim_start().starts_with("URL:"))?;
    let first_after = lines.map(str::trim).find(|l| !l.is_empty())?;
    if first_after.starts_with("Status: SKIPPED") || first_after.starts_with("Status: ERROR") {
        Some(first_after)
    } else {
        None
    }
}

// ── Tests ──
