mod artifact;
mod browser;
mod driver;
mod extract;
mod normalize;
mod resume;
mod sites;
mod tracker;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "job_scraper", about = "Job-posting extractor for tracker spreadsheets")]
struct Cli {
    /// Tracker CSV with Category / Company / Job Title / Link columns
    #[arg(short, long, default_value = "job_tracker.csv")]
    input: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch job pages and write per-category description files
    Extract {
        /// Directory for the per-category artifacts
        #[arg(short, long, default_value = "descriptions")]
        out_dir: PathBuf,
        /// Max records to fetch this run (default: all queued)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fill missing company/title/days-ago cells back into the tracker
    Fill {
        /// Max rows to fill this run
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show resume state per category without touching the network
    Status {
        #[arg(short, long, default_value = "descriptions")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract { out_dir, limit } => {
            let summary = driver::run_extract(&cli.input, &out_dir, limit).await?;
            summary.print();
            Ok(())
        }
        Commands::Fill { limit } => {
            let summary = driver::run_fill(&cli.input, limit).await?;
            summary.print();
            Ok(())
        }
        Commands::Status { out_dir } => print_status(&cli.input, &out_dir),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Per-category reconciliation counts from the artifacts alone.
fn print_status(input: &std::path::Path, out_dir: &std::path::Path) -> anyhow::Result<()> {
    use resume::Disposition;

    let tracker = tracker::Tracker::load(input)?;
    let records = tracker.records();

    let mut categories: Vec<String> = Vec::new();
    for r in &records {
        if !categories.contains(&r.category) {
            categories.push(r.category.clone());
        }
    }

    println!(
        "{:<24} | {:>5} | {:>5} | {:>6} | {:>4}",
        "Category", "rows", "done", "retry", "new"
    );
    println!("{}", "-".repeat(56));

    let (mut total, mut done, mut retry, mut new) = (0usize, 0usize, 0usize, 0usize);
    for category in &categories {
        let index = resume::ResumeIndex::load(&artifact::artifact_path(out_dir, category));
        let (mut c_total, mut c_done, mut c_retry, mut c_new) = (0usize, 0usize, 0usize, 0usize);
        for r in records.iter().filter(|r| &r.category == category) {
            c_total += 1;
            match index.classify(r.url.as_deref()) {
                Disposition::Done => c_done += 1,
                Disposition::Retry => c_retry += 1,
                Disposition::New => c_new += 1,
            }
        }
        println!(
            "{:<24} | {:>5} | {:>5} | {:>6} | {:>4}",
            truncate(category, 24),
            c_total,
            c_done,
            c_retry,
            c_new
        );
        total += c_total;
        done += c_done;
        retry += c_retry;
        new += c_new;
    }

    println!("{}", "-".repeat(56));
    println!(
        "{:<24} | {:>5} | {:>5} | {:>6} | {:>4}",
        "total", total, done, retry, new
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
