use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::browser::{PageGuard, PageError};
use crate::normalize::normalize;
use crate::sites::SiteFamily;

static POSTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(minute|hour|day|week|month)").unwrap());

/// What a page yielded. All fields independently optional; partial success
/// is a valid outcome.
#[derive(Debug, Default, Clone)]
pub struct Extraction {
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub description: Option<String>,
    pub days_ago: Option<u32>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.company.is_none()
            && self.job_title.is_none()
            && self.description.is_none()
            && self.days_ago.is_none()
    }
}

/// Ordered selector strategies for one site family. Plain data: the
/// extraction loop takes the first selector that yields non-empty text.
struct SelectorChain {
    title: &'static [&'static str],
    company: &'static [&'static str],
    description: &'static [&'static str],
    posted: &'static [&'static str],
    /// Optional pre-step: a control to click before reading the description.
    expand_control: Option<&'static str>,
    /// Settle-delay bounds after navigation, in milliseconds.
    settle_ms: (u64, u64),
    /// Reject description containers shorter than this much raw HTML.
    min_desc_html: usize,
}

static LINKEDIN: SelectorChain = SelectorChain {
    title: &[
        "h1.top-card-layout__title",
        "h1.topcard__title",
        "h1[class*='job-title']",
        ".job-details-jobs-unified-top-card__job-title h1",
        "h1",
    ],
    company: &[
        "a.topcard__org-name-link",
        ".topcard__flavor a",
        "a[class*='company-name']",
        ".job-details-jobs-unified-top-card__company-name a",
        "a[href*='/company/']",
    ],
    description: &[
        ".show-more-less-html__markup",
        ".description__text",
        ".jobs-description__content",
        ".jobs-box__html-content",
        "div[class*='description']",
        ".job-details",
    ],
    posted: &[
        ".posted-time-ago__text",
        ".topcard__flavor--metadata span",
        "span[class*='posted']",
        ".job-details-jobs-unified-top-card__primary-description-container span",
    ],
    expand_control: Some(".show-more-less-html__button--more"),
    settle_ms: (2000, 4000),
    min_desc_html: 0,
};

static GREENHOUSE: SelectorChain = SelectorChain {
    title: &["h1.app-title", "h1[class*='title']"],
    company: &[".company-name", "[class*='company']"],
    description: &["#content", ".content", "[class*='description']"],
    posted: &[],
    expand_control: None,
    settle_ms: (2000, 4000),
    min_desc_html: 0,
};

static WORKDAY: SelectorChain = SelectorChain {
    title: &[
        "[data-automation-id=\"jobPostingHeader\"]",
        "h2[data-automation-id=\"jobTitle\"]",
        "h1",
    ],
    company: &[],
    description: &[
        "[data-automation-id=\"jobPostingDescription\"]",
        "[class*='jobDescription']",
    ],
    posted: &[],
    expand_control: None,
    settle_ms: (3000, 5000),
    min_desc_html: 0,
};

static HRMDIRECT: SelectorChain = SelectorChain {
    title: &[".careersTitle", "h1"],
    company: &[],
    description: &[".jobDesc", "div.jobDesc", ".reqResult", "#content"],
    posted: &[],
    expand_control: None,
    settle_ms: (2000, 4000),
    min_desc_html: 0,
};

static GENERIC: SelectorChain = SelectorChain {
    title: &[
        "h1[class*='title']",
        "h1[class*='job']",
        "h1[class*='posting']",
        "h1[data-automation*='title']",
        ".job-title",
        ".posting-title",
        "h1",
        "h2[class*='title']",
    ],
    company: &[
        "[class*='company']",
        "[data-automation*='company']",
        ".employer-name",
        ".company-name",
        "a[href*='/company']",
    ],
    description: &[
        "[class*='description']",
        "[class*='job-content']",
        "[data-automation*='description']",
        ".job-details",
        "[class*='posting-content']",
        "[class*='job-body']",
        "article",
        ".content",
    ],
    posted: &[],
    expand_control: None,
    settle_ms: (3000, 5000),
    min_desc_html: 100,
};

fn chain(family: SiteFamily) -> &'static SelectorChain {
    match family {
        SiteFamily::Linkedin => &LINKEDIN,
        SiteFamily::Greenhouse => &GREENHOUSE,
        SiteFamily::Workday => &WORKDAY,
        SiteFamily::HrmDirect => &HRMDIRECT,
        // Lever and Oracle pages carry no stable family-specific markup.
        SiteFamily::Lever | SiteFamily::OracleCloud | SiteFamily::Generic => &GENERIC,
    }
}

/// Settle-delay bounds to apply after navigating to a page of this family.
pub fn settle_ms(family: SiteFamily) -> (u64, u64) {
    chain(family).settle_ms
}

/// Run the family's fallback chains against a loaded page. Selector misses
/// never surface; only page-level failures (transport, timeout) propagate.
pub async fn extract(page: &PageGuard, family: SiteFamily) -> Result<Extraction, PageError> {
    let chain = chain(family);

    let job_title = first_text(page, chain.title).await?;
    let company = first_text(page, chain.company).await?;

    if let Some(control) = chain.expand_control {
        // Expands truncated descriptions; missing control is fine.
        if page.click_if_present(control).await? {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
    }

    let mut description = first_description(page, chain).await?;
    if description.is_none() && !std::ptr::eq(chain, &GENERIC) {
        // Markup drifts faster than family chains are maintained; the
        // generic chain is the safety net for the description field.
        debug!("{} description chain exhausted, trying generic", family.label());
        description = first_description(page, &GENERIC).await?;
    }

    let days_ago = match posted_text(page, chain.posted).await? {
        Some(text) => parse_posted_time(&text),
        None => None,
    };

    Ok(Extraction { company, job_title, description, days_ago })
}

async fn first_text(
    page: &PageGuard,
    selectors: &[&str],
) -> Result<Option<String>, PageError> {
    for selector in selectors {
        if let Some(text) = page.query_text(selector).await? {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// First selector whose container holds enough HTML to be a real
/// description, normalized to plain text.
async fn first_description(
    page: &PageGuard,
    chain: &SelectorChain,
) -> Result<Option<String>, PageError> {
    for selector in chain.description {
        if let Some(html) = page.query_html(selector).await? {
            if html.len() <= chain.min_desc_html {
                continue;
            }
            let text = normalize(&html);
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}

/// First element under the posted-time selectors whose text actually talks
/// about recency; boards reuse these classes for other metadata.
async fn posted_text(
    page: &PageGuard,
    selectors: &[&str],
) -> Result<Option<String>, PageError> {
    const RECENCY_WORDS: &[&str] = &["ago", "minute", "hour", "day", "week", "month"];
    for selector in selectors {
        for text in page.query_text_all(selector).await? {
            let lower = text.to_lowercase();
            if RECENCY_WORDS.iter().any(|w| lower.contains(w)) {
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}

/// Parse "<n> <unit>[s] ago" recency text into whole days. Minutes and hours
/// collapse to 0, weeks are 7 days, months 30. Anything unparseable is None,
/// never zero.
pub fn parse_posted_time(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let caps = POSTED_RE.captures(&lower)?;
    let n: u32 = caps[1].parse().ok()?;
    match &caps[2] {
        "minute" | "hour" => Some(0),
        "day" => Some(n),
        "week" => Some(n * 7),
        "month" => Some(n * 30),
        _ => None,
    }
}

// ── Tests ──
