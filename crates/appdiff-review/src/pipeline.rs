use std::time::Duration;

use appdiff_core::{AppDiffConfig, AppDiffError, Application, DiffResult, Outcome};
use appdiff_text::normalize::DiffNormalizer;
use appdiff_text::scrub::scrub_secrets;
use indicatif::ProgressBar;
use tracing::{error, info};

use crate::argocd::Inventory;
use crate::github::{self, PullRequestContext, PullRequestHost};
use crate::publish::{PublishSummary, ReportPublisher};
use crate::report::ReportContext;
use crate::runner::{DiffRunner, DiffTool};
use crate::select::{self, NameMatcher};

/// Run settings derived from configuration and the pull request.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// `owner/repo` of the repository under review.
    pub repo_slug: String,
    pub matcher: NameMatcher,
    pub delay: Duration,
    pub fail_on_errors: bool,
    pub noise_labels: Vec<String>,
    pub report: ReportContext,
    /// Render the report without touching PR comments.
    pub dry_run: bool,
}

impl PipelineSettings {
    /// Build settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Config`] if the app name matcher is an invalid regex.
    pub fn from_config(
        config: &AppDiffConfig,
        pr: &PullRequestContext,
        timestamp: String,
    ) -> Result<Self, AppDiffError> {
        Ok(Self {
            repo_slug: pr.pr.slug(),
            matcher: NameMatcher::parse(&config.diff.app_name_matcher)?,
            delay: Duration::from_millis(config.diff.delay_ms),
            fail_on_errors: config.diff.fail_on_errors,
            noise_labels: config.diff.noise_labels.clone(),
            report: ReportContext {
                environment: config.report.environment.clone(),
                app_link_base: config.argocd.public_base_url(),
                commit_sha: pr.head_sha.clone(),
                commit_url: pr.pr.commit_url(&pr.head_sha),
                timestamp,
            },
            dry_run: false,
        })
    }
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Applications the selector kept.
    pub selected: Vec<Application>,
    /// One result per selected application, in selection order.
    pub results: Vec<DiffResult>,
    /// `None` when the run aborted before publishing.
    pub publish: Option<PublishSummary>,
    pub outcome: Outcome,
}

impl RunReport {
    fn aborted(stage: &str, err: &AppDiffError) -> Self {
        let message = scrub_secrets(&format!("{stage} failed: {err}"));
        error!(stage, error = %message, "aborting run");
        Self {
            selected: Vec::new(),
            results: Vec::new(),
            publish: None,
            outcome: Outcome::Failed(message),
        }
    }
}

/// End-to-end run: change set, inventory, selection, diffs, report.
pub struct Pipeline<'a> {
    host: &'a dyn PullRequestHost,
    inventory: &'a dyn Inventory,
    tool: &'a dyn DiffTool,
    settings: PipelineSettings,
    progress: Option<ProgressBar>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        host: &'a dyn PullRequestHost,
        inventory: &'a dyn Inventory,
        tool: &'a dyn DiffTool,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            host,
            inventory,
            tool,
            settings,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Execute the run.
    ///
    /// Failing to fetch the change set or the inventory aborts the run with
    /// an empty result set and a failed outcome; nothing is published.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Upstream`] if publishing the comment fails.
    pub async fn run(&self) -> Result<RunReport, AppDiffError> {
        let changed_files = match github::resolve_change_set(self.host).await {
            Ok(files) => files,
            Err(e) => return Ok(RunReport::aborted("changed files", &e)),
        };
        info!(count = changed_files.len(), "resolved pull request change set");

        let inventory = match self.inventory.list_applications().await {
            Ok(apps) => apps,
            Err(e) => return Ok(RunReport::aborted("application inventory", &e)),
        };
        info!(count = inventory.len(), "fetched application inventory");

        let selected = select::select_applications(
            inventory,
            &self.settings.repo_slug,
            &changed_files,
            &self.settings.matcher,
        );
        let names: Vec<&str> = selected.iter().map(|a| a.name()).collect();
        info!(count = selected.len(), apps = ?names, "selected applications");

        let mut runner = DiffRunner::new(self.tool, self.settings.delay);
        if let Some(pb) = &self.progress {
            runner = runner.with_progress(pb.clone());
        }
        let results = runner.run(&selected).await;

        let publisher = ReportPublisher::new(
            self.host,
            self.settings.report.clone(),
            DiffNormalizer::new(self.settings.noise_labels.clone()),
            self.settings.fail_on_errors,
        )
        .dry_run(self.settings.dry_run);
        let summary = publisher.publish(&results).await?;

        Ok(RunReport {
            selected,
            results,
            outcome: summary.outcome.clone(),
            publish: Some(summary),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::PullRequestRef;

    #[test]
    fn settings_from_config() {
        let mut config = AppDiffConfig::default();
        config.argocd.server_url = "argocd.internal".into();
        config.argocd.public_url = Some("https://argocd.acme.dev".into());
        config.diff.app_name_matcher = "/web/".into();
        config.diff.delay_ms = 10;
        config.report.environment = "prod".into();
        let pr = PullRequestContext {
            pr: PullRequestRef {
                owner: "acme".into(),
                repo: "deploy".into(),
                number: 3,
            },
            head_sha: "abc".into(),
        };

        let settings = PipelineSettings::from_config(&config, &pr, "now".into()).unwrap();
        assert_eq!(settings.repo_slug, "acme/deploy");
        assert!(matches!(settings.matcher, NameMatcher::Pattern(_)));
        assert_eq!(settings.delay, Duration::from_millis(10));
        assert_eq!(settings.report.app_link_base, "https://argocd.acme.dev");
        assert_eq!(
            settings.report.commit_url,
            "https://github.com/acme/deploy/pull/3/commits/abc"
        );
        assert!(!settings.dry_run);
    }

    #[test]
    fn bad_matcher_is_rejected() {
        let mut config = AppDiffConfig::default();
        config.diff.app_name_matcher = "/[/".into();
        let pr = PullRequestContext {
            pr: "acme/deploy#1".parse().unwrap(),
            head_sha: "abc".into(),
        };
        assert!(PipelineSettings::from_config(&config, &pr, "now".into()).is_err());
    }
}
