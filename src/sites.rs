use std::sync::LazyLock;

use regex::Regex;

static LINKEDIN_VIEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"linkedin\.com/jobs/view/(\d+)").unwrap());
static LINKEDIN_SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"linkedin\.com/jobs/search.*currentJobId=(\d+)").unwrap());

/// Job-board platform class sharing a common DOM convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteFamily {
    Linkedin,
    Greenhouse,
    Workday,
    Lever,
    OracleCloud,
    HrmDirect,
    Generic,
}

impl SiteFamily {
    pub fn label(&self) -> &'static str {
        match self {
            SiteFamily::Linkedin => "linkedin",
            SiteFamily::Greenhouse => "greenhouse",
            SiteFamily::Workday => "workday",
            SiteFamily::Lever => "lever",
            SiteFamily::OracleCloud => "oracle",
            SiteFamily::HrmDirect => "hrmdirect",
            SiteFamily::Generic => "generic",
        }
    }
}

/// Map a URL to its site family by host/path substring. Pure, never fails:
/// hosts we don't recognize (including the merely job-like "careers." and
/// "jobs." ones) fall back to `Generic`.
pub fn classify(url: &str) -> SiteFamily {
    if url.contains("linkedin.com") {
        SiteFamily::Linkedin
    } else if url.contains("greenhouse.io") {
        SiteFamily::Greenhouse
    } else if url.contains("myworkdayjobs.com") || url.contains("workday.com") {
        SiteFamily::Workday
    } else if url.contains("lever.co") {
        SiteFamily::Lever
    } else if url.contains("oraclecloud.com") {
        SiteFamily::OracleCloud
    } else if url.contains("hrmdirect.com") {
        SiteFamily::HrmDirect
    } else {
        SiteFamily::Generic
    }
}

/// Whether the URL has the shape of an individual job posting for its family.
/// LinkedIn requires a numeric posting id (either a /jobs/view/<id> path or a
/// currentJobId=<id> search parameter); other families accept any URL since
/// their posting paths carry no uniform shape.
pub fn is_job_posting(url: &str, family: SiteFamily) -> bool {
    match family {
        SiteFamily::Linkedin => {
            LINKEDIN_VIEW_RE.is_match(url) || LINKEDIN_SEARCH_RE.is_match(url)
        }
        _ => true,
    }
}

/// Canonical dedup key for a job URL: tracking parameters stripped, trailing
/// slash removed, and LinkedIn URLs collapsed to their job-id-only form so
/// that a /jobs/view/ link and a search link with currentJobId for the same
/// posting normalize identically.
pub fn normalize_url(url: &str) -> String {
    if let Some(caps) = LINKEDIN_VIEW_RE.captures(url) {
        return format!("linkedin.com/jobs/view/{}", &caps[1]);
    }
    if let Some(caps) = LINKEDIN_SEARCH_RE.captures(url) {
        return format!("linkedin.com/jobs/view/{}", &caps[1]);
    }
    url.split('?').next().unwrap_or(url).trim_end_matches('/').to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_families() {
        assert_eq!(classify("https://www.linkedin.com/jobs/view/123"), SiteFamily::Linkedin);
        assert_eq!(classify("https://boards.greenhouse.io/acme/jobs/42"), SiteFamily::Greenhouse);
        assert_eq!(classify("https://acme.wd1.myworkdayjobs.com/en-US/ext/job/R-1"), SiteFamily::Workday);
        assert_eq!(classify("https://jobs.lever.co/acme/abc"), SiteFamily::Lever);
        assert_eq!(classify("https://acme.fa.us2.oraclecloud.com/hcmUI/CandidateExperience"), SiteFamily::OracleCloud);
        assert_eq!(classify("https://acme.hrmdirect.com/employment/job-opening.php?req=1"), SiteFamily::HrmDirect);
    }

    #[test]
    fn classify_job_like_hosts_fall_back_to_generic() {
        assert_eq!(classify("https://careers.acme.com/posting/99"), SiteFamily::Generic);
        assert_eq!(classify("https://jobs.acme.com/99"), SiteFamily::Generic);
        assert_eq!(classify("https://example.com/about"), SiteFamily::Generic);
    }

    #[test]
    fn linkedin_posting_shape() {
        assert!(is_job_posting("https://www.linkedin.com/jobs/view/3910023456/", SiteFamily::Linkedin));
        assert!(is_job_posting(
            "https://www.linkedin.com/jobs/search/?currentJobId=3910023456&keywords=rust",
            SiteFamily::Linkedin,
        ));
        // Company page, not a posting
        assert!(!is_job_posting("https://www.linkedin.com/company/acme", SiteFamily::Linkedin));
        // Non-LinkedIn families have no uniform shape requirement
        assert!(is_job_posting("https://boards.greenhouse.io/acme/jobs/42", SiteFamily::Greenhouse));
    }

    #[test]
    fn normalize_strips_tracking_params() {
        let a = normalize_url("https://careers.acme.com/posting/99?utm_source=x&ref=mail");
        let b = normalize_url("https://careers.acme.com/posting/99/?gh_src=abc123");
        assert_eq!(a, b);
        assert_eq!(a, "https://careers.acme.com/posting/99");
    }

    #[test]
    fn normalize_collapses_linkedin_variants() {
        let view = normalize_url("https://www.linkedin.com/jobs/view/3910023456/?refId=xyz");
        let search = normalize_url(
            "https://www.linkedin.com/jobs/search/?currentJobId=3910023456&keywords=rust",
        );
        assert_eq!(view, "linkedin.com/jobs/view/3910023456");
        assert_eq!(view, search);
    }

    #[test]
    fn normalize_is_idempotent() {
        for url in [
            "https://www.linkedin.com/jobs/view/42?x=1",
            "https://careers.acme.com/posting/99?utm_source=x",
        ] {
            let once = normalize_url(url);
            assert_eq!(normalize_url(&once), once);
        }
    }
}
