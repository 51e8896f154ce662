//! Noise removal for `argocd app diff` output.
//!
//! The CLI prints one section per resource, each opened by a
//! `===== group/Kind namespace/name ======` header and followed by a
//! classic line-oriented diff (`12c12`, `< old`, `---`, `> new`). Argo CD
//! stamps its own tracking labels on every resource, so a local render
//! often differs from the live object only in those labels. Those hunks
//! carry no information about the pull request and are removed here.

use std::sync::LazyLock;

use regex::Regex;

static CHANGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(,\d+)?[acd]\d+(,\d+)?$").expect("valid change marker regex")
});

const SECTION_HEADER: &str = "=====";

/// Label keys stripped by [`DiffNormalizer::default`].
pub const DEFAULT_NOISE_LABELS: [&str; 2] =
    ["app.kubernetes.io/instance", "argocd.argoproj.io/instance"];

/// Strips label-only changes from raw diff text.
///
/// # Examples
///
/// ```
/// use appdiff_text::normalize::DiffNormalizer;
///
/// let raw = "===== apps/Deployment default/web ======\n\
///            4c4\n\
///            <     app.kubernetes.io/instance: web\n\
///            ---\n\
///            >     app.kubernetes.io/instance: web-prod";
/// assert_eq!(DiffNormalizer::default().normalize(raw), "");
/// ```
#[derive(Debug, Clone)]
pub struct DiffNormalizer {
    labels: Vec<String>,
}

impl Default for DiffNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_LABELS.iter().map(|l| l.to_string()).collect())
    }
}

impl DiffNormalizer {
    /// Create a normalizer that strips changes to the given label keys.
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Normalize raw diff text.
    ///
    /// Sections are split at `=====` headers; noise lines are dropped, along
    /// with any hunk left without a `<`/`>` line. Sections that end up with
    /// only a header (or nothing) are dropped. Survivors are trimmed and
    /// joined with single newlines. Running it on its own output is a no-op.
    pub fn normalize(&self, raw: &str) -> String {
        split_sections(raw)
            .into_iter()
            .filter_map(|section| self.normalize_section(&section))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn normalize_section(&self, lines: &[&str]) -> Option<String> {
        let (header, body) = match lines.first() {
            Some(first) if first.starts_with(SECTION_HEADER) => (Some(*first), &lines[1..]),
            _ => (None, lines),
        };

        let mut kept: Vec<&str> = Vec::new();
        for hunk in split_hunks(body) {
            kept.extend(self.normalize_hunk(&hunk));
        }

        let body = kept.join("\n");
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        let section = match header {
            Some(h) => format!("{h}\n{body}"),
            None => body.to_string(),
        };
        Some(section.trim().to_string())
    }

    fn normalize_hunk<'a>(&self, hunk: &[&'a str]) -> Vec<&'a str> {
        let has_marker = hunk.first().is_some_and(|l| is_change_marker(l));
        let kept: Vec<&str> = hunk
            .iter()
            .copied()
            .filter(|line| !self.is_noise(line))
            .collect();

        if has_marker && !kept.iter().any(|l| is_change_line(l)) {
            return Vec::new();
        }
        kept
    }

    fn is_noise(&self, line: &str) -> bool {
        if !is_change_line(line) {
            return false;
        }
        let content = line[1..].trim_start();
        self.labels.iter().any(|label| {
            content
                .strip_prefix(label.as_str())
                .is_some_and(|rest| rest.starts_with(':'))
        })
    }
}

fn is_change_marker(line: &str) -> bool {
    CHANGE_MARKER.is_match(line.trim())
}

fn is_change_line(line: &str) -> bool {
    line.starts_with('<') || line.starts_with('>')
}

fn split_sections(raw: &str) -> Vec<Vec<&str>> {
    let mut sections: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in raw.lines() {
        if line.starts_with(SECTION_HEADER) && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

/// Split a section body at change markers. Lines before the first marker
/// form a hunk of their own.
fn split_hunks<'a>(body: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut hunks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body {
        if is_change_marker(line) && !current.is_empty() {
            hunks.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        hunks.push(current);
    }
    hunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = "\
===== apps/Deployment payments/api ======
5c5
<     app.kubernetes.io/instance: api
---
>     app.kubernetes.io/instance: api-prod
40c40
<         image: api:1.0.0
---
>         image: api:1.1.0
===== /Service payments/api ======
7c7
<     argocd.argoproj.io/instance: api
---
>     argocd.argoproj.io/instance: api-prod
";

    #[test]
    fn removes_label_hunks_and_empty_sections() {
        let out = DiffNormalizer::default().normalize(MIXED);
        assert_eq!(
            out,
            "===== apps/Deployment payments/api ======\n40c40\n<         image: api:1.0.0\n---\n>         image: api:1.1.0"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let n = DiffNormalizer::default();
        let once = n.normalize(MIXED);
        assert_eq!(n.normalize(&once), once);

        let plain = "--- a\n+++ b";
        assert_eq!(n.normalize(&n.normalize(plain)), n.normalize(plain));
    }

    #[test]
    fn keeps_real_changes_in_mixed_hunk() {
        let raw = "===== /ConfigMap default/cfg ======\n3,4c3,4\n<     app.kubernetes.io/instance: cfg\n<   LOG_LEVEL: info\n---\n>     app.kubernetes.io/instance: cfg-2\n>   LOG_LEVEL: debug";
        let out = DiffNormalizer::default().normalize(raw);
        assert!(out.contains("LOG_LEVEL: info"));
        assert!(out.contains("LOG_LEVEL: debug"));
        assert!(!out.contains("instance"));
    }

    #[test]
    fn header_only_section_is_dropped() {
        let raw = "===== /Service default/a ======\n\n===== /Service default/b ======\n1a2\n> foo: bar";
        let out = DiffNormalizer::default().normalize(raw);
        assert_eq!(out, "===== /Service default/b ======\n1a2\n> foo: bar");
    }

    #[test]
    fn text_without_headers_is_kept() {
        let out = DiffNormalizer::default().normalize("\n--- a\n+++ b\n");
        assert_eq!(out, "--- a\n+++ b");
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert_eq!(DiffNormalizer::default().normalize(""), "");
        assert_eq!(DiffNormalizer::default().normalize("  \n\n"), "");
    }

    #[test]
    fn label_prefix_of_other_key_is_not_noise() {
        let raw = "1c1\n<   app.kubernetes.io/instance-type: small\n---\n>   app.kubernetes.io/instance-type: large";
        let out = DiffNormalizer::default().normalize(raw);
        assert_eq!(out, raw);
    }

    #[test]
    fn custom_labels() {
        let n = DiffNormalizer::new(vec!["team".into()]);
        let raw = "2c2\n<   team: a\n---\n>   team: b";
        assert_eq!(n.normalize(raw), "");
    }
}
