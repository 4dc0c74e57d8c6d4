use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

/// Entry separator. The resume reconciler splits on runs of 40+ dashes, so
/// this exact line is the parse anchor and must never appear inside a
/// description.
pub const SEPARATOR: &str =
    "----------------------------------------";

const BANNER: &str =
    "============================================================";

/// One persisted record. Exactly one status; entries are append-only.
#[derive(Debug, Clone)]
pub struct OutputEntry {
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub url: Option<String>,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Extracted { description: String },
    Skipped { reason: String },
    Error { reason: String },
}

/// Append-only writer for one category's artifact. Every entry is flushed
/// before the next network request so a crash mid-run leaves a valid,
/// re-parseable partial file.
pub struct ArtifactWriter {
    file: File,
    path: PathBuf,
}

impl ArtifactWriter {
    /// Open (or create) the artifact for a category, writing the generated
    /// banner for new files and an appended banner for resumed ones.
    pub fn open(dir: &Path, category: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output dir {}", dir.display()))?;
        let path = artifact_path(dir, category);
        let existed = path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening artifact {}", path.display()))?;

        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        if existed {
            write!(file, "\n{}\nAppended: {}\n{}\n\n", BANNER, now, BANNER)?;
        } else {
            write!(file, "{}\nCategory: {}\nGenerated: {}\n{}\n\n", BANNER, category, now, BANNER)?;
        }
        file.flush()?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and flush it to disk.
    pub fn append(&mut self, entry: &OutputEntry) -> Result<()> {
        let text = render_entry(entry);
        self.file.write_all(text.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

pub fn artifact_path(dir: &Path, category: &str) -> PathBuf {
    dir.join(format!("{}_jobs.txt", sanitize_filename(category)))
}

/// Strip characters that are invalid in filenames.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect()
}

fn render_entry(entry: &OutputEntry) -> String {
    let company = entry.company.as_deref().unwrap_or("N/A");
    let title = entry.job_title.as_deref().unwrap_or("N/A");
    let url = entry.url.as_deref().unwrap_or("N/A");

    let mut out = format!("Company: {}\nJob Title: {}\nURL: {}\n", company, title, url);
    match &entry.status {
        EntryStatus::Extracted { description } => {
            out.push('\n');
            out.push_str(&defang_separators(description));
            out.push('\n');
        }
        EntryStatus::Skipped { reason } => {
            out.push_str(&format!("Status: SKIPPED - {}\n", reason));
        }
        EntryStatus::Error { reason } => {
            out.push_str(&format!("Status: ERROR - {}\n", reason));
        }
    }
    out.push_str(&format!("\n{}\n\n", SEPARATOR));
    out
}

/// Shorten any all-dash line of 40+ characters inside a description so it
/// cannot alias the entry separator when the artifact is re-parsed.
fn defang_separators(text: &str) -> String {
    text.lines()
        .map(|line| {
            let t = line.trim();
            if t.len() >= 40 && t.chars().all(|c| c == '-') {
                "-".repeat(39)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flat end-of-run error log, one line per failed or skipped record.
/// Written only when there were errors.
pub fn write_error_log(dir: &Path, errors: &[String]) -> Result<Option<PathBuf>> {
    if errors.is_empty() {
        return Ok(None);
    }
    let path = dir.join("extraction_errors.txt");
    let mut out = format!(
        "Extraction Errors - {}\n{}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        BANNER
    );
    for e in errors {
        out.push_str(e);
        out.push('\n');
    }
    std::fs::write(&path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(Some(path))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_is_forty_dashes() {
        assert_eq!(SEPARATOR.len(), 40);
        assert!(SEPARATOR.chars().all(|c| c == '-'));
    }

    #[test]
    fn renders_extracted_entry() {
        let entry = OutputEntry {
            company: Some("Acme".into()),
            job_title: Some("Engineer".into()),
            url: Some("https://careers.acme.com/1".into()),
            status: EntryStatus::Extracted { description: "Build things".into() },
        };
        let text = render_entry(&entry);
        assert!(text.starts_with("Company: Acme\nJob Title: Engineer\nURL: https://careers.acme.com/1\n\nBuild things\n"));
        assert!(text.contains(SEPARATOR));
        assert!(!text.contains("Status:"));
    }

    #[test]
    fn renders_skipped_entry_with_na_fields() {
        let entry = OutputEntry {
            company: None,
            job_title: None,
            url: None,
            status: EntryStatus::Skipped { reason: "No URL".into() },
        };
        let text = render_entry(&entry);
        assert!(text.contains("Company: N/A\n"));
        assert!(text.contains("URL: N/A\n"));
        assert!(text.contains("Status: SKIPPED - No URL\n"));
    }

    #[test]
    fn descriptions_cannot_alias_the_separator() {
        let dashes = "-".repeat(50);
        let entry = OutputEntry {
            company: None,
            job_title: None,
            url: Some("https://x.test/1".into()),
            status: EntryStatus::Extracted { description: format!("above\n{}\nbelow", dashes) },
        };
        let text = render_entry(&entry);
        // Exactly one separator-sized dash run: the real one at the end.
        let runs = text
            .lines()
            .filter(|l| l.len() >= 40 && l.chars().all(|c| c == '-'))
            .count();
        assert_eq!(runs, 1);
    }

    #[test]
    fn sanitizes_category_filenames() {
        assert_eq!(sanitize_filename("Analog/Mixed-Signal"), "AnalogMixed-Signal");
        assert_eq!(sanitize_filename("Digital"), "Digital");
    }
}
