use std::fmt::Write;

use appdiff_core::{DiffResult, SyncStatus};
use appdiff_text::normalize::DiffNormalizer;
use appdiff_text::scrub::scrub_secrets;

const LEGEND: &str = "\
| Legend | Status |
| :---:  | :---   |
| ✅     | The app is synced in ArgoCD, and diffs you see are solely from this PR. |
| ⚠️      | The app is out-of-sync in ArgoCD, and the diffs you see include those changes plus any from this PR. |
| 🛑     | There was an error generating the ArgoCD diffs due to changes in this PR. |";

/// Fixed comment header for an environment.
///
/// Every report for the environment contains this string, and only those
/// reports do; it is how stale comments are found and replaced.
///
/// # Examples
///
/// ```
/// use appdiff_review::report::comment_header;
///
/// assert_eq!(comment_header("staging"), "## ArgoCD Diff on `staging`");
/// ```
pub fn comment_header(environment: &str) -> String {
    format!("## ArgoCD Diff on `{environment}`")
}

/// Everything a report needs besides the diff results.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Environment label embedded in the header.
    pub environment: String,
    /// Base URL for application links, e.g. `https://argocd.acme.dev`.
    pub app_link_base: String,
    /// Full SHA of the commit under review.
    pub commit_sha: String,
    /// Link to the commit.
    pub commit_url: String,
    /// Pre-formatted local timestamp.
    pub timestamp: String,
}

/// Normalize the diff text of every result.
pub fn normalize_results(results: &[DiffResult], normalizer: &DiffNormalizer) -> Vec<DiffResult> {
    results
        .iter()
        .cloned()
        .map(|mut r| {
            r.diff = normalizer.normalize(&r.diff);
            r
        })
        .collect()
}

/// Drop clean results and sort the rest: successes first, then failures,
/// each group by application name.
pub fn prepare(results: &[DiffResult]) -> Vec<DiffResult> {
    let mut kept: Vec<DiffResult> = results
        .iter()
        .filter(|r| r.has_diff() || r.is_failed())
        .cloned()
        .collect();
    kept.sort_by(|a, b| {
        a.is_failed()
            .cmp(&b.is_failed())
            .then_with(|| a.app.name().cmp(b.app.name()))
    });
    kept
}

/// One-line run summary over all results, including clean ones.
///
/// # Examples
///
/// ```
/// use appdiff_core::{Application, DiffResult};
/// use appdiff_review::report::render_summary;
///
/// let app = Application::new("web", "https://github.com/acme/deploy", "apps/web");
/// let results = vec![DiffResult::with_diff(app, "1a2\n> x")];
/// assert_eq!(
///     render_summary(&results),
///     "**Summary:** 1 apps processed: 1 succeeded (1 with diffs), 0 failed"
/// );
/// ```
pub fn render_summary(results: &[DiffResult]) -> String {
    let total = results.len();
    let failed: Vec<&str> = results
        .iter()
        .filter(|r| r.is_failed())
        .map(|r| r.app.name())
        .collect();
    let succeeded = total - failed.len();
    let with_diffs = results
        .iter()
        .filter(|r| !r.is_failed() && r.has_diff())
        .count();

    let mut line = format!(
        "**Summary:** {total} apps processed: {succeeded} succeeded ({with_diffs} with diffs), {} failed",
        failed.len()
    );
    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(|n| format!("`{n}`")).collect();
        let _ = write!(line, " ({})", names.join(", "));
    }
    line
}

/// Markdown section for one kept result.
pub fn render_app_section(result: &DiffResult, app_link_base: &str) -> String {
    let name = result.app.name();
    let mut out = String::new();

    let _ = writeln!(out, "App: [`{name}`]({app_link_base}/applications/{name})");
    let generation = if result.is_failed() {
        "Error 🛑"
    } else {
        "Success 🟢"
    };
    let _ = writeln!(out, "YAML generation: {generation}  ");
    let sync = match result.app.sync_status() {
        SyncStatus::InSync => "Synced ✅",
        SyncStatus::OutOfSync => "Out of Sync ⚠️",
    };
    let _ = writeln!(out, "App sync status: {sync}");

    if let Some(failure) = &result.failure {
        let error = serde_json::to_string_pretty(&failure.error)
            .unwrap_or_else(|_| failure.error.to_string());
        let _ = write!(
            out,
            "\n<details>\n<summary>Error output</summary>\n\n\
             **`stderr:`**\n```\n{}\n```\n\n\
             **`error:`**\n```json\n{error}\n```\n</details>\n",
            failure.stderr.trim()
        );
    }

    if result.has_diff() {
        let _ = write!(
            out,
            "\n<details>\n<summary>Diff</summary>\n\n```diff\n{}\n```\n</details>\n",
            result.diff
        );
    }

    out.push_str("\n---\n");
    out
}

/// Render the full comment body, secrets scrubbed.
///
/// `all` is every normalized result of the run (for the summary); `kept` is
/// the output of [`prepare`].
pub fn render_report(ctx: &ReportContext, all: &[DiffResult], kept: &[DiffResult]) -> String {
    let short_sha: String = ctx.commit_sha.chars().take(7).collect();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} for commit [`{short_sha}`]({})",
        comment_header(&ctx.environment),
        ctx.commit_url
    );
    let _ = writeln!(out, "_Updated at {}_\n", ctx.timestamp);
    let _ = writeln!(out, "{}\n", render_summary(all));
    for result in kept {
        out.push_str(&render_app_section(result, &ctx.app_link_base));
        out.push('\n');
    }
    out.push_str(LEGEND);
    out.push('\n');

    scrub_secrets(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use appdiff_core::{Application, DiffFailure};

    const REPO: &str = "https://github.com/acme/deploy";

    fn failure(stderr: &str) -> DiffFailure {
        DiffFailure {
            stdout: String::new(),
            stderr: stderr.into(),
            error: serde_json::json!({
                "cmd": "argocd app diff y --auth-token=s3cr3t --server=argocd.acme.dev",
                "code": 20,
            }),
        }
    }

    fn ctx() -> ReportContext {
        ReportContext {
            environment: "prod".into(),
            app_link_base: "https://argocd.acme.dev".into(),
            commit_sha: "0123456789abcdef".into(),
            commit_url: "https://github.com/acme/deploy/pull/1/commits/0123456789abcdef".into(),
            timestamp: "2026-10-18 09:30:00 +00:00".into(),
        }
    }

    #[test]
    fn prepare_sorts_failures_last_then_by_name() {
        let results = vec![
            DiffResult::failed(Application::new("alpha", REPO, "apps/alpha"), failure("x")),
            DiffResult::with_diff(Application::new("zulu", REPO, "apps/zulu"), "1a2\n> z"),
            DiffResult::clean(Application::new("clean", REPO, "apps/clean")),
            DiffResult::with_diff(Application::new("Bravo", REPO, "apps/bravo"), "1a2\n> b"),
            DiffResult::failed(Application::new("Able", REPO, "apps/able"), failure("y")),
        ];
        let kept = prepare(&normalize_results(&results, &DiffNormalizer::default()));
        let names: Vec<&str> = kept.iter().map(|r| r.app.name()).collect();
        assert_eq!(names, vec!["Bravo", "zulu", "Able", "alpha"]);
    }

    #[test]
    fn prepare_drops_results_that_are_only_noise() {
        let noisy = "===== /Service default/web ======\n3c3\n<     app.kubernetes.io/instance: a\n---\n>     app.kubernetes.io/instance: b";
        let results = vec![DiffResult::with_diff(
            Application::new("web", REPO, "apps/web"),
            noisy,
        )];
        let normalized = normalize_results(&results, &DiffNormalizer::default());
        assert_eq!(normalized[0].diff, "");
        assert!(prepare(&normalized).is_empty());
    }

    #[test]
    fn summary_names_failed_apps() {
        let results = vec![
            DiffResult::with_diff(Application::new("a", REPO, "apps/a"), "d"),
            DiffResult::clean(Application::new("b", REPO, "apps/b")),
            DiffResult::failed(Application::new("c", REPO, "apps/c"), failure("e")),
        ];
        assert_eq!(
            render_summary(&results),
            "**Summary:** 3 apps processed: 2 succeeded (1 with diffs), 1 failed (`c`)"
        );
    }

    #[test]
    fn section_for_out_of_sync_diff() {
        let app = Application::new("web", REPO, "apps/web").with_sync_status(SyncStatus::OutOfSync);
        let section = render_app_section(&DiffResult::with_diff(app, "1a2\n> x"), "https://argocd.acme.dev");
        assert!(section.contains("App: [`web`](https://argocd.acme.dev/applications/web)"));
        assert!(section.contains("Success 🟢"));
        assert!(section.contains("Out of Sync ⚠️"));
        assert!(section.contains("```diff\n1a2\n> x\n```"));
        assert!(!section.contains("stderr"));
    }

    #[test]
    fn section_for_failure_has_error_block() {
        let app = Application::new("y", REPO, "apps/y");
        let section = render_app_section(
            &DiffResult::failed(app, failure("connection refused")),
            "https://argocd.acme.dev",
        );
        assert!(section.contains("Error 🛑"));
        assert!(section.contains("Synced ✅"));
        assert!(section.contains("```\nconnection refused\n```"));
        assert!(section.contains("\"code\": 20"));
        assert!(!section.contains("```diff"));
    }

    #[test]
    fn report_has_header_summary_and_legend_and_no_token() {
        let all = vec![DiffResult::failed(
            Application::new("y", REPO, "apps/y"),
            failure("token s3cr3t rejected"),
        )];
        let kept = prepare(&all);
        let doc = render_report(&ctx(), &all, &kept);

        assert!(doc.starts_with(
            "## ArgoCD Diff on `prod` for commit [`0123456`](https://github.com/acme/deploy/pull/1/commits/0123456789abcdef)"
        ));
        assert!(doc.contains("_Updated at 2026-10-18 09:30:00 +00:00_"));
        assert!(doc.contains("1 failed (`y`)"));
        assert!(doc.contains("| Legend | Status |"));
        assert!(!doc.contains("s3cr3t"));
        assert!(doc.contains("--auth-token=***"));
    }
}
