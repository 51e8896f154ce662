use appdiff_core::{AppDiffError, DiffResult, Outcome};
use appdiff_text::normalize::DiffNormalizer;
use tracing::{error, info, warn};

use crate::github::PullRequestHost;
use crate::report::{self, ReportContext};

/// What a publish pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    /// The rendered comment body, when any result was worth reporting.
    pub document: Option<String>,
    /// Stale comments removed.
    pub deleted: usize,
    /// Whether a new comment was created.
    pub posted: bool,
    pub outcome: Outcome,
}

/// Decide the run verdict from all diff results.
///
/// # Examples
///
/// ```
/// use appdiff_core::{Application, DiffResult, Outcome};
/// use appdiff_review::publish::decide_outcome;
///
/// let app = Application::new("a", "https://github.com/acme/deploy", "apps/a");
/// assert_eq!(decide_outcome(&[DiffResult::clean(app)], true), Outcome::Success);
/// ```
pub fn decide_outcome(results: &[DiffResult], fail_on_errors: bool) -> Outcome {
    let total = results.len();
    let failed = results.iter().filter(|r| r.is_failed()).count();
    if failed == 0 {
        return Outcome::Success;
    }

    let message = if failed == total {
        format!("All {total} apps failed to generate diffs")
    } else {
        format!("{failed} errors out of {total} apps")
    };
    if fail_on_errors {
        Outcome::Failed(message)
    } else {
        Outcome::Warning(message)
    }
}

/// Renders the report and replaces the previous one on the pull request.
pub struct ReportPublisher<'a> {
    host: &'a dyn PullRequestHost,
    context: ReportContext,
    normalizer: DiffNormalizer,
    fail_on_errors: bool,
    dry_run: bool,
}

impl<'a> ReportPublisher<'a> {
    pub fn new(
        host: &'a dyn PullRequestHost,
        context: ReportContext,
        normalizer: DiffNormalizer,
        fail_on_errors: bool,
    ) -> Self {
        Self {
            host,
            context,
            normalizer,
            fail_on_errors,
            dry_run: false,
        }
    }

    /// Render only; never list, delete, or create comments.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Publish the report for `results`.
    ///
    /// Stale comments carrying this environment's header are deleted even
    /// when there is nothing new to post.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Upstream`] if a comment API call fails.
    pub async fn publish(&self, results: &[DiffResult]) -> Result<PublishSummary, AppDiffError> {
        let normalized = report::normalize_results(results, &self.normalizer);
        let kept = report::prepare(&normalized);
        let document = if kept.is_empty() {
            None
        } else {
            Some(report::render_report(&self.context, &normalized, &kept))
        };
        let outcome = decide_outcome(&normalized, self.fail_on_errors);

        if self.dry_run {
            info!(kept = kept.len(), "dry run, not touching PR comments");
            return Ok(PublishSummary {
                document,
                deleted: 0,
                posted: false,
                outcome,
            });
        }

        let header = report::comment_header(&self.context.environment);
        let mut deleted = 0;
        for comment in self.host.list_comments().await? {
            if comment.body.contains(&header) {
                self.host.delete_comment(comment.id).await?;
                deleted += 1;
            }
        }
        if deleted > 0 {
            info!(deleted, "removed stale report comments");
        }

        let posted = match &document {
            Some(body) => {
                self.host.create_comment(body).await?;
                info!(apps = kept.len(), "posted diff report");
                true
            }
            None => {
                info!("no diffs or errors to report, skipping comment");
                false
            }
        };

        match &outcome {
            Outcome::Success => {}
            Outcome::Warning(msg) => warn!("{msg}"),
            Outcome::Failed(msg) => error!(fail_on_errors = true, "{msg}"),
        }

        Ok(PublishSummary {
            document,
            deleted,
            posted,
            outcome,
        })
    }
}
