use std::path::Path;

use appdiff_core::AppDiffError;
use async_trait::async_trait;
use octocrab::models::CommentId;
use serde::Deserialize;
use tracing::debug;

/// A pull request on a GitHub repository.
///
/// # Examples
///
/// ```
/// use appdiff_review::github::PullRequestRef;
///
/// let pr: PullRequestRef = "acme/deploy#42".parse().unwrap();
/// assert_eq!(pr.slug(), "acme/deploy");
/// assert_eq!(pr.number, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// `owner/repo`, the form Argo CD repository URLs are matched against.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Link to a commit as seen from this pull request.
    pub fn commit_url(&self, sha: &str) -> String {
        format!(
            "https://github.com/{}/{}/pull/{}/commits/{sha}",
            self.owner, self.repo, self.number
        )
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

impl std::str::FromStr for PullRequestRef {
    type Err = AppDiffError;

    /// Parse `owner/repo#number`.
    fn from_str(pr_ref: &str) -> Result<Self, Self::Err> {
        let Some((owner_repo, number_str)) = pr_ref.split_once('#') else {
            return Err(AppDiffError::Config(format!(
                "invalid PR reference '{pr_ref}', expected owner/repo#number"
            )));
        };
        let (owner, repo) = parse_repository(owner_repo)?;
        let number: u64 = number_str
            .parse()
            .map_err(|_| AppDiffError::Config(format!("invalid PR number: {number_str}")))?;
        Ok(Self {
            owner,
            repo,
            number,
        })
    }
}

fn parse_repository(owner_repo: &str) -> Result<(String, String), AppDiffError> {
    match owner_repo.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(AppDiffError::Config(format!(
            "invalid repository '{owner_repo}', expected owner/repo"
        ))),
    }
}

/// The pull request under evaluation and the commit the report describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestContext {
    pub pr: PullRequestRef,
    pub head_sha: String,
}

#[derive(Deserialize)]
struct EventPayload {
    pull_request: Option<EventPullRequest>,
}

#[derive(Deserialize)]
struct EventPullRequest {
    number: u64,
    head: EventHead,
}

#[derive(Deserialize)]
struct EventHead {
    sha: String,
}

impl PullRequestContext {
    /// Build the context from a GitHub Actions event payload.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Config`] if the repository is malformed or the
    /// event is not a pull request event.
    ///
    /// # Examples
    ///
    /// ```
    /// use appdiff_review::github::PullRequestContext;
    ///
    /// let payload = r#"{"pull_request": {"number": 7, "head": {"sha": "abc123"}}}"#;
    /// let ctx = PullRequestContext::from_event_payload("acme/deploy", payload).unwrap();
    /// assert_eq!(ctx.pr.number, 7);
    /// assert_eq!(ctx.head_sha, "abc123");
    /// ```
    pub fn from_event_payload(repository: &str, payload: &str) -> Result<Self, AppDiffError> {
        let (owner, repo) = parse_repository(repository)?;
        let event: EventPayload = serde_json::from_str(payload)?;
        let Some(pull_request) = event.pull_request else {
            return Err(AppDiffError::Config(
                "GitHub event has no pull_request; run this on pull_request events".into(),
            ));
        };
        Ok(Self {
            pr: PullRequestRef {
                owner,
                repo,
                number: pull_request.number,
            },
            head_sha: pull_request.head.sha,
        })
    }

    /// Build the context from the `GITHUB_REPOSITORY` and `GITHUB_EVENT_PATH`
    /// environment variables set by GitHub Actions.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Config`] if either variable is missing, or
    /// [`AppDiffError::FileNotFound`] if the event file does not exist.
    pub fn from_actions_env() -> Result<Self, AppDiffError> {
        let repository = std::env::var("GITHUB_REPOSITORY").map_err(|_| {
            AppDiffError::Config("GITHUB_REPOSITORY not set. Pass --pr owner/repo#number".into())
        })?;
        let event_path = std::env::var("GITHUB_EVENT_PATH").map_err(|_| {
            AppDiffError::Config("GITHUB_EVENT_PATH not set. Pass --pr owner/repo#number".into())
        })?;
        let event_path = Path::new(&event_path);
        if !event_path.exists() {
            return Err(AppDiffError::FileNotFound(event_path.to_path_buf()));
        }
        let payload = std::fs::read_to_string(event_path)?;
        Self::from_event_payload(&repository, &payload)
    }
}

/// An issue comment on a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrComment {
    pub id: u64,
    pub body: String,
}

/// The code-hosting platform operations appdiff needs, bound to one pull request.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    /// Paths of every file the pull request changes, across all pages.
    async fn list_changed_files(&self) -> Result<Vec<String>, AppDiffError>;

    /// Every issue comment on the pull request.
    async fn list_comments(&self) -> Result<Vec<PrComment>, AppDiffError>;

    async fn delete_comment(&self, id: u64) -> Result<(), AppDiffError>;

    async fn create_comment(&self, body: &str) -> Result<(), AppDiffError>;
}

/// GitHub client bound to a single pull request.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    pr: PullRequestRef,
}

impl GitHubClient {
    /// Create a client from an explicit token or the `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Config`] if no token is available, or
    /// [`AppDiffError::Upstream`] if the client cannot be built.
    pub fn new(token: Option<&str>, pr: PullRequestRef) -> Result<Self, AppDiffError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                AppDiffError::Config(
                    "GITHUB_TOKEN not set. Pass --github-token or set GITHUB_TOKEN env var".into(),
                )
            })?,
        };

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| AppDiffError::Upstream(format!("failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab, pr })
    }
}

#[async_trait]
impl PullRequestHost for GitHubClient {
    async fn list_changed_files(&self) -> Result<Vec<String>, AppDiffError> {
        let first = self
            .octocrab
            .pulls(&self.pr.owner, &self.pr.repo)
            .list_files(self.pr.number)
            .await
            .map_err(|e| AppDiffError::Upstream(format!("failed to list PR files: {e}")))?;
        let files = self
            .octocrab
            .all_pages(first)
            .await
            .map_err(|e| AppDiffError::Upstream(format!("failed to page PR files: {e}")))?;
        debug!(count = files.len(), "listed changed files");
        Ok(files.into_iter().map(|f| f.filename).collect())
    }

    async fn list_comments(&self) -> Result<Vec<PrComment>, AppDiffError> {
        let first = self
            .octocrab
            .issues(&self.pr.owner, &self.pr.repo)
            .list_comments(self.pr.number)
            .per_page(100)
            .send()
            .await
            .map_err(|e| AppDiffError::Upstream(format!("failed to list PR comments: {e}")))?;
        let comments = self
            .octocrab
            .all_pages(first)
            .await
            .map_err(|e| AppDiffError::Upstream(format!("failed to page PR comments: {e}")))?;
        Ok(comments
            .into_iter()
            .map(|c| PrComment {
                id: c.id.0,
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete_comment(&self, id: u64) -> Result<(), AppDiffError> {
        self.octocrab
            .issues(&self.pr.owner, &self.pr.repo)
            .delete_comment(CommentId(id))
            .await
            .map_err(|e| AppDiffError::Upstream(format!("failed to delete comment {id}: {e}")))
    }

    async fn create_comment(&self, body: &str) -> Result<(), AppDiffError> {
        self.octocrab
            .issues(&self.pr.owner, &self.pr.repo)
            .create_comment(self.pr.number, body)
            .await
            .map_err(|e| AppDiffError::Upstream(format!("failed to create comment: {e}")))?;
        Ok(())
    }
}

/// Fetch the pull request's change set.
///
/// A failure here is fatal for the run: a partial change set would silently
/// hide affected applications.
///
/// # Errors
///
/// Returns [`AppDiffError::Upstream`] if the platform call fails.
pub async fn resolve_change_set(host: &dyn PullRequestHost) -> Result<Vec<String>, AppDiffError> {
    host.list_changed_files().await
}
