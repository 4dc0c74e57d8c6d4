use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::artifact::{write_error_log, ArtifactWriter, EntryStatus, OutputEntry};
use crate::browser::{jitter, PageError, Session};
use crate::extract::{self, Extraction};
use crate::resume::{Disposition, ResumeIndex};
use crate::sites::{classify, is_job_posting, SiteFamily};
use crate::tracker::{JobRecord, RowUpdate, Tracker};

/// Pause between records, on top of each page's settle delay.
const REQUEST_DELAY_MS: (u64, u64) = (2000, 4000);
const FILL_DELAY_MS: (u64, u64) = (3000, 6000);

pub struct ExtractSummary {
    pub done: usize,
    pub retried: usize,
    pub new: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl ExtractSummary {
    pub fn print(&self) {
        println!(
            "Already done: {} | retried: {} | new: {}",
            self.done, self.retried, self.new
        );
        println!(
            "This run: {} extracted, {} skipped, {} errors.",
            self.extracted, self.skipped, self.errored
        );
    }
}

pub struct FillSummary {
    pub processed: usize,
    pub updated: usize,
    pub errored: usize,
}

impl FillSummary {
    pub fn print(&self) {
        println!(
            "Processed {} rows: {} updated, {} errors.",
            self.processed, self.updated, self.errored
        );
    }
}

/// Extract mode: fetch each queued job page and append the result to its
/// category's artifact. Re-runs are additive; DONE records are never
/// refetched.
pub async fn run_extract(
    tracker_path: &Path,
    out_dir: &Path,
    limit: Option<usize>,
) -> Result<ExtractSummary> {
    let tracker = Tracker::load(tracker_path)?;
    let by_category = group_by_category(tracker.records());

    let mut summary = ExtractSummary {
        done: 0,
        retried: 0,
        new: 0,
        extracted: 0,
        skipped: 0,
        errored: 0,
    };

    // Reconcile against existing artifacts before touching the network.
    let mut queues: Vec<(String, Vec<JobRecord>)> = Vec::new();
    let mut budget = limit.unwrap_or(usize::MAX);
    for (category, records) in by_category {
        let index = ResumeIndex::load(&crate::artifact::artifact_path(out_dir, &category));
        let mut queued = Vec::new();
        for record in records {
            match index.classify(record.url.as_deref()) {
                Disposition::Done => summary.done += 1,
                Disposition::Retry => {
                    summary.retried += 1;
                    if budget > 0 {
                        budget -= 1;
                        queued.push(record);
                    }
                }
                Disposition::New => {
                    summary.new += 1;
                    if budget > 0 {
                        budget -= 1;
                        queued.push(record);
                    }
                }
            }
        }
        if !queued.is_empty() {
            info!(
                "{}: {} done, {} queued",
                category,
                index.done_count(),
                queued.len()
            );
            queues.push((category, queued));
        }
    }

    let total: usize = queues.iter().map(|(_, q)| q.len()).sum();
    if total == 0 {
        info!("nothing to extract; all records already in the artifacts");
        return Ok(summary);
    }

    info!("launching browser for {} records", total);
    let session = Session::launch().await?;
    let result = extract_queues(&session, out_dir, queues, total, &mut summary).await;
    if let Err(e) = session.close().await {
        warn!("browser teardown: {}", e);
    }
    result?;
    Ok(summary)
}

async fn extract_queues(
    session: &Session,
    out_dir: &Path,
    queues: Vec<(String, Vec<JobRecord>)>,
    total: usize,
    summary: &mut ExtractSummary,
) -> Result<()> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut errors: Vec<String> = Vec::new();

    for (category, records) in queues {
        let mut writer = ArtifactWriter::open(out_dir, &category)?;
        info!("processing {} ({} records)", category, records.len());

        for record in records {
            pb.set_message(format!("row {}", record.row));
            let (entry, fetched) = process_record(session, &record).await;

            match &entry.status {
                EntryStatus::Extracted { .. } => summary.extracted += 1,
                EntryStatus::Skipped { reason } => {
                    summary.skipped += 1;
                    errors.push(format!("Row {}: SKIPPED - {}", record.row, reason));
                }
                EntryStatus::Error { reason } => {
                    summary.errored += 1;
                    errors.push(format!("Row {}: ERROR - {}", record.row, reason));
                }
            }

            writer.append(&entry)?;
            pb.inc(1);

            if fetched {
                tokio::time::sleep(jitter(REQUEST_DELAY_MS)).await;
            }
        }
        info!("saved {}", writer.path().display());
    }

    pb.finish_and_clear();

    if let Some(path) = write_error_log(out_dir, &errors)? {
        info!("{} problem records logged to {}", errors.len(), path.display());
    }
    Ok(())
}

/// Handle one record end to end. Returns the entry plus whether a network
/// fetch was attempted (skips must not trigger the inter-request delay).
/// Page-level failures are downgraded here; a single bad page never aborts
/// the batch.
async fn process_record(session: &Session, record: &JobRecord) -> (OutputEntry, bool) {
    let Some(url) = record.url.as_deref() else {
        return (skip_entry(record, "No URL"), false);
    };

    let family = classify(url);
    if !is_job_posting(url, family) {
        return (
            skip_entry(record, "Not a recognized job posting URL"),
            false,
        );
    }

    let status = match fetch_and_extract(session, url, family).await {
        Ok(extraction) if extraction.is_empty() => EntryStatus::Error {
            reason: "Page loaded but no fields could be extracted".into(),
        },
        Ok(extraction) => {
            return (extracted_entry(record, url, extraction), true);
        }
        Err(PageError::NavigationTimeout) => EntryStatus::Error {
            reason: "Page load timed out".into(),
        },
        Err(PageError::Unexpected(e)) => EntryStatus::Error {
            reason: format!("Unexpected failure: {}", e),
        },
    };

    warn!("row {}: {:?}", record.row, status);
    (
        OutputEntry {
            company: record.existing_company.clone(),
            job_title: record.existing_title.clone(),
            url: Some(url.to_string()),
            status,
        },
        true,
    )
}

async fn fetch_and_extract(
    session: &Session,
    url: &str,
    family: SiteFamily,
) -> Result<Extraction, PageError> {
    let page = session.open(url, extract::settle_ms(family)).await?;
    let result = extract::extract(&page, family).await;
    page.close().await;
    result
}

fn skip_entry(record: &JobRecord, reason: &str) -> OutputEntry {
    OutputEntry {
        company: record.existing_company.clone(),
        job_title: record.existing_title.clone(),
        url: record.url.clone(),
        status: EntryStatus::Skipped { reason: reason.to_string() },
    }
}

fn extracted_entry(record: &JobRecord, url: &str, extraction: Extraction) -> OutputEntry {
    OutputEntry {
        company: extraction.company.or_else(|| record.existing_company.clone()),
        job_title: extraction.job_title.or_else(|| record.existing_title.clone()),
        url: Some(url.to_string()),
        status: EntryStatus::Extracted {
            description: extraction
                .description
                .unwrap_or_else(|| "No description available".to_string()),
        },
    }
}

/// Fill mode: walk LinkedIn rows with missing company/title/recency cells and
/// write the extracted values back into the tracker, saving after every row.
pub async fn run_fill(tracker_path: &Path, limit: Option<usize>) -> Result<FillSummary> {
    let mut tracker = Tracker::load(tracker_path)?;

    let pending: Vec<JobRecord> = tracker
        .records()
        .into_iter()
        .filter(|r| {
            r.url
                .as_deref()
                .map(|url| {
                    classify(url) == SiteFamily::Linkedin
                        && is_job_posting(url, SiteFamily::Linkedin)
                })
                .unwrap_or(false)
        })
        .filter(|r| {
            r.existing_company.is_none()
                || r.existing_title.is_none()
                || r.existing_days.is_none()
        })
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    let mut summary = FillSummary { processed: 0, updated: 0, errored: 0 };
    if pending.is_empty() {
        info!("no rows need filling");
        return Ok(summary);
    }

    info!("launching browser for {} rows", pending.len());
    let session = Session::launch().await?;
    let result = fill_rows(&session, &mut tracker, pending, &mut summary).await;
    if let Err(e) = session.close().await {
        warn!("browser teardown: {}", e);
    }
    result?;
    Ok(summary)
}

async fn fill_rows(
    session: &Session,
    tracker: &mut Tracker,
    pending: Vec<JobRecord>,
    summary: &mut FillSummary,
) -> Result<()> {
    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let last = pending.len().saturating_sub(1);
    for (i, record) in pending.into_iter().enumerate() {
        summary.processed += 1;
        pb.set_message(format!("row {}", record.row));
        let url = record.url.as_deref().unwrap_or_default();

        match fetch_and_extract(session, url, SiteFamily::Linkedin).await {
            Ok(extraction) => {
                let update = RowUpdate {
                    company: extraction.company.filter(|_| record.existing_company.is_none()),
                    job_title: extraction.job_title.filter(|_| record.existing_title.is_none()),
                    days_ago: extraction.days_ago.filter(|_| record.existing_days.is_none()),
                };
                if update.is_empty() {
                    warn!("row {}: nothing extracted", record.row);
                    summary.errored += 1;
                } else {
                    // Durable before the next request; a crash loses nothing.
                    tracker.apply_update(record.row, &update)?;
                    summary.updated += 1;
                }
            }
            Err(e) => {
                warn!("row {}: {}", record.row, e);
                summary.errored += 1;
            }
        }

        pb.inc(1);
        if i < last {
            tokio::time::sleep(jitter(FILL_DELAY_MS)).await;
        }
    }

    pb.finish_and_clear();
    Ok(())
}

fn group_by_category(records: Vec<JobRecord>) -> Vec<(String, Vec<JobRecord>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<JobRecord>> =
        std::collections::HashMap::new();

    for record in records {
        if !groups.contains_key(&record.category) {
            order.push(record.category.clone());
        }
        groups.entry(record.category.clone()).or_default().push(record);
    }

    order
        .into_iter()
        .map(|category| {
            let records = groups.remove(&category).unwrap_or_default();
            (category, records)
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str, url: Option<&str>) -> JobRecord {
        JobRecord {
            row: 2,
            category: category.to_string(),
            url: url.map(str::to_string),
            existing_company: Some("Acme".to_string()),
            existing_title: Some("Engineer".to_string()),
            existing_days: None,
        }
    }

    #[test]
    fn no_url_record_becomes_skipped_without_network() {
        // skip_entry is the pre-network path; no session is involved.
        let entry = skip_entry(&record("Digital", None), "No URL");
        assert_eq!(entry.url, None);
        assert_eq!(entry.status, EntryStatus::Skipped { reason: "No URL".into() });
        assert_eq!(entry.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn extracted_entry_falls_back_to_tracker_fields() {
        let extraction = Extraction {
            company: None,
            job_title: Some("Senior Engineer".into()),
            description: None,
            days_ago: None,
        };
        let entry = extracted_entry(&record("Digital", Some("https://x.test/1")), "https://x.test/1", extraction);
        assert_eq!(entry.company.as_deref(), Some("Acme"));
        assert_eq!(entry.job_title.as_deref(), Some("Senior Engineer"));
        assert_eq!(
            entry.status,
            EntryStatus::Extracted { description: "No description available".into() }
        );
    }

    #[test]
    fn grouping_preserves_first_seen_category_order() {
        let records = vec![
            record("Digital", None),
            record("Analog", None),
            record("Digital", None),
        ];
        let grouped = group_by_category(records);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "Digital");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].0, "Analog");
    }
}
