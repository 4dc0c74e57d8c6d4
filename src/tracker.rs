use std::fs::File;
use std::io::Write;
use std::mem::take;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// One spreadsheet row, reduced to what the pipeline consumes: a resolved
/// URL plus fallback text fields. Immutable once read.
#[derive(Debug, Clone)]
pub struct JobRecord {
    /// 1-based row number in the tracker (header is row 1).
    pub row: usize,
    pub category: String,
    pub url: Option<String>,
    pub existing_company: Option<String>,
    pub existing_title: Option<String>,
    pub existing_days: Option<String>,
}

/// A field-update request for one row, applied by `Tracker::apply_update`.
#[derive(Debug, Default, Clone)]
pub struct RowUpdate {
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub days_ago: Option<u32>,
}

impl RowUpdate {
    pub fn is_empty(&self) -> bool {
        self.company.is_none() && self.job_title.is_none() && self.days_ago.is_none()
    }
}

struct Columns {
    category: usize,
    company: usize,
    title: usize,
    link: usize,
    days: usize,
}

/// The job tracker spreadsheet (CSV with a header row). Update mode rewrites
/// the whole file through a temp-and-rename so a crash between rows never
/// leaves a torn tracker.
pub struct Tracker {
    path: PathBuf,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    cols: Columns,
}

impl Tracker {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading tracker {}", path.display()))?;
        let mut rows = parse_rows(&text);
        if rows.is_empty() {
            bail!("tracker {} is empty", path.display());
        }
        let header = rows.remove(0);
        let cols = resolve_columns(&header);
        Ok(Self { path: path.to_path_buf(), header, rows, cols })
    }

    /// All rows with a category, in sheet order.
    pub fn records(&self) -> Vec<JobRecord> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let category = cell(row, self.cols.category)?;
                Some(JobRecord {
                    row: i + 2, // 1-based, after the header
                    category,
                    url: self.resolve_url(row),
                    existing_company: cell(row, self.cols.company),
                    existing_title: cell(row, self.cols.title).filter(|t| !is_url(t)),
                    existing_days: cell(row, self.cols.days),
                })
            })
            .collect()
    }

    /// The link cell may carry the URL; some sheets paste it into the title
    /// cell instead.
    fn resolve_url(&self, row: &[String]) -> Option<String> {
        cell(row, self.cols.link)
            .filter(|v| is_url(v))
            .or_else(|| cell(row, self.cols.title).filter(|v| is_url(v)))
    }

    /// Apply one row's field updates and persist them durably, so a crash
    /// before the next network request loses nothing.
    pub fn apply_update(&mut self, row: usize, update: &RowUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let idx = row
            .checked_sub(2)
            .filter(|i| *i < self.rows.len())
            .with_context(|| format!("row {} out of range", row))?;

        let width = [self.cols.company, self.cols.title, self.cols.days]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1;
        let cells = &mut self.rows[idx];
        if cells.len() < width {
            cells.resize(width, String::new());
        }
        if let Some(company) = &update.company {
            cells[self.cols.company] = company.clone();
        }
        if let Some(title) = &update.job_title {
            cells[self.cols.title] = title.clone();
        }
        if let Some(days) = update.days_ago {
            cells[self.cols.days] = days.to_string();
        }
        self.save()
    }

    fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        let mut out = Vec::new();
        write_row(&mut out, &self.header);
        for row in &self.rows {
            write_row(&mut out, row);
        }
        let mut file = File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        file.write_all(&out)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

fn cell(row: &[String], idx: usize) -> Option<String> {
    row.get(idx).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn resolve_columns(header: &[String]) -> Columns {
    let find = |name: &str, default: usize| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .unwrap_or(default)
    };
    Columns {
        category: find("Category", 0),
        company: find("Company", 1),
        title: find("Job Title", 2),
        link: find("Link", 3),
        days: find("How long ago (Days)", 4),
    }
}

// ── CSV plumbing ──

/// Minimal CSV parser, quote and CRLF tolerant.
fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    row.push(field);
    if !(row.len() == 1 && row[0].is_empty()) {
        rows.push(row);
    }
    rows
}

fn write_row(out: &mut Vec<u8>, row: &[String]) {
    for (i, field) in row.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            out.push(b'"');
            out.extend_from_slice(field.replace('"', "\"\"").as_bytes());
            out.push(b'"');
        } else {
            out.extend_from_slice(field.as_bytes());
        }
    }
    out.push(b'\n');
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Category,Company,Job Title,Link,How long ago (Days)";

    fn tracker_from(text: &str) -> Tracker {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static SEQ: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "tracker_test_{}_{}.csv",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed),
        ));
        std::fs::write(&path, text).unwrap();
        Tracker::load(&path).unwrap()
    }

    #[test]
    fn parses_quoted_fields_and_crlf() {
        let rows = parse_rows("a,\"b,с\",\"say \"\"hi\"\"\"\r\nd,e,f\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "b,с");
        assert_eq!(rows[0][2], "say \"hi\"");
    }

    #[test]
    fn records_resolve_url_from_link_or_title_cell() {
        let text = format!(
            "{}\nDigital,Acme,Engineer,https://careers.acme.com/1,\n\
             Analog,,https://jobs.widgets.com/2,,\n\
             Digital,Initech,Analyst,,\n",
            HEADER
        );
        let t = tracker_from(&text);
        let records = t.records();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].url.as_deref(), Some("https://careers.acme.com/1"));
        assert_eq!(records[0].existing_title.as_deref(), Some("Engineer"));

        // URL pasted into the title cell: resolved as URL, not as a title.
        assert_eq!(records[1].url.as_deref(), Some("https://jobs.widgets.com/2"));
        assert_eq!(records[1].existing_title, None);

        assert_eq!(records[2].url, None);
        assert_eq!(records[2].existing_company.as_deref(), Some("Initech"));
    }

    #[test]
    fn rows_without_category_are_ignored() {
        let text = format!("{}\n,,Orphan,,\nDigital,Acme,Engineer,,\n", HEADER);
        let t = tracker_from(&text);
        assert_eq!(t.records().len(), 1);
    }

    #[test]
    fn update_persists_and_survives_reload() {
        let text = format!("{}\nDigital,,,https://careers.acme.com/1,\n", HEADER);
        let mut t = tracker_from(&text);
        let path = t.path.clone();

        t.apply_update(
            2,
            &RowUpdate {
                company: Some("Acme".into()),
                job_title: Some("Engineer".into()),
                days_ago: Some(7),
            },
        )
        .unwrap();

        let reloaded = Tracker::load(&path).unwrap();
        let records = reloaded.records();
        assert_eq!(records[0].existing_company.as_deref(), Some("Acme"));
        assert_eq!(records[0].existing_title.as_deref(), Some("Engineer"));
        assert_eq!(records[0].existing_days.as_deref(), Some("7"));
    }
}
