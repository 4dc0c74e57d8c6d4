use std::sync::LazyLock;

use regex::Regex;

static LI_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li[^>]*>").unwrap());
static LI_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</li>").unwrap());
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static P_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</p>").unwrap());
static DIV_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</div>").unwrap());
static H_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</h[1-6]>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Convert an HTML fragment to plain text, preserving bullet and paragraph
/// structure. Total: the worst case is stripped tag-free text.
///
/// Structural replacements (1-4) must run before tag stripping (5); stripping
/// first would destroy the boundaries the bullets and blank lines are rebuilt
/// from.
pub fn normalize(html: &str) -> String {
    // 1. List items become indented bullets; closing tags add nothing.
    let text = LI_OPEN_RE.replace_all(html, "\n  \u{2022} ");
    let text = LI_CLOSE_RE.replace_all(&text, "");
    // 2. Line breaks.
    let text = BR_RE.replace_all(&text, "\n");
    // 3. Paragraph close = blank line, div close = single newline.
    let text = P_CLOSE_RE.replace_all(&text, "\n\n");
    let text = DIV_CLOSE_RE.replace_all(&text, "\n");
    // 4. Heading closings.
    let text = H_CLOSE_RE.replace_all(&text, "\n\n");
    // 5. Strip everything else.
    let text = TAG_RE.replace_all(&text, "");
    // 6. The six common entities.
    let text = decode_entities(&text);
    // 7. Whitespace cleanup.
    collapse_lines(&text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Trim each line, re-indenting bullet lines, and collapse runs of blank
/// lines down to a single one.
fn collapse_lines(text: &str) -> String {
    let mut cleaned: Vec<String> = Vec::new();
    let mut prev_empty = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !prev_empty && !cleaned.is_empty() {
                cleaned.push(String::new());
            }
            prev_empty = true;
        } else if let Some(rest) = line.strip_prefix('\u{2022}') {
            cleaned.push(format!("  \u{2022}{}", rest));
            prev_empty = false;
        } else {
            cleaned.push(line.to_string());
            prev_empty = false;
        }
    }

    while matches!(cleaned.last(), Some(l) if l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_paragraphs_and_bullets() {
        let html = "<div><p>Role summary</p><ul><li>Own the pipeline</li><li>Write tests</li></ul></div>";
        let expected = "Role summary\n\n  \u{2022} Own the pipeline\n  \u{2022} Write tests";
        assert_eq!(normalize(html), expected);
    }

    #[test]
    fn br_and_headings_break_lines() {
        let html = "<h2>About us</h2>First line<br>Second line";
        assert_eq!(normalize(html), "About us\n\nFirst line\nSecond line");
    }

    #[test]
    fn decodes_common_entities() {
        let html = "<p>Fish &amp; Chips &lt;fresh&gt;&nbsp;&quot;daily&quot; &#39;yum&#39;</p>";
        assert_eq!(normalize(html), "Fish & Chips <fresh> \"daily\" 'yum'");
    }

    #[test]
    fn total_on_garbage_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("<div><span>"), "");
        assert_eq!(normalize("plain text, no tags"), "plain text, no tags");
    }

    #[test]
    fn collapses_blank_runs() {
        let html = "<p>a</p><p></p><p></p><p>b</p>";
        assert_eq!(normalize(html), "a\n\nb");
    }

    #[test]
    fn idempotent_on_own_output() {
        let inputs = [
            "<div><p>Role summary</p><ul><li>Own the pipeline</li><li>Write tests</li></ul></div>",
            "<h1>Title</h1><p>Body &amp; more</p>",
            "already\n\n  \u{2022} plain",
        ];
        for html in inputs {
            let once = normalize(html);
            assert_eq!(normalize(&once), once);
        }
    }
}
