//! Narrow the Argo CD inventory down to the apps a pull request can affect.
//!
//! Filters run in a fixed order and never reorder the inventory:
//! 1. tracked: the app's repo URL contains `owner/repo` and it follows the
//!    primary branch (`main`, `master`, or no revision);
//! 2. affected: a changed file lives under the first two segments of the
//!    app's source path;
//! 3. named: the optional name matcher accepts the app.

use appdiff_core::{AppDiffError, Application};
use regex::Regex;
use tracing::debug;

const PRIMARY_REVISIONS: [&str; 3] = ["", "master", "main"];
const PREFIX_SEGMENTS: usize = 2;

/// Application name filter parsed from the `app_name_matcher` setting.
///
/// # Examples
///
/// ```
/// use appdiff_review::select::NameMatcher;
///
/// let m = NameMatcher::parse("/^pay/").unwrap();
/// assert!(m.matches("payments"));
/// assert!(!m.matches("web"));
///
/// let m = NameMatcher::parse("web, api").unwrap();
/// assert!(m.matches("api"));
/// assert!(!m.matches("payments"));
///
/// assert!(NameMatcher::parse("").unwrap().matches("anything"));
/// ```
#[derive(Debug, Clone, Default)]
pub enum NameMatcher {
    /// No filter.
    #[default]
    All,
    /// `/regex/` form.
    Pattern(Regex),
    /// Comma separated exact names.
    Names(Vec<String>),
}

impl NameMatcher {
    /// Parse a matcher: `/regex/`, `a,b,c`, or empty.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Config`] if the `/regex/` form does not compile.
    pub fn parse(input: &str) -> Result<Self, AppDiffError> {
        let input = input.trim();
        if input.len() >= 2 && input.starts_with('/') && input.ends_with('/') {
            let pattern = &input[1..input.len() - 1];
            let re = Regex::new(pattern).map_err(|e| {
                AppDiffError::Config(format!("invalid app name regex '{pattern}': {e}"))
            })?;
            return Ok(Self::Pattern(re));
        }
        let names: Vec<String> = input
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            Ok(Self::All)
        } else {
            Ok(Self::Names(names))
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Pattern(re) => re.is_match(name),
            Self::Names(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Whether `app` is deployed from this repository's primary branch.
/// Multi-source apps are never tracked.
pub fn is_tracked(app: &Application, repo_slug: &str) -> bool {
    app.has_single_source()
        && app.repo_url().contains(repo_slug)
        && PRIMARY_REVISIONS.contains(&app.target_revision())
}

/// The first two segments of the app's source path, e.g. `apps/web` for
/// `apps/web/overlays/prod`.
///
/// # Examples
///
/// ```
/// use appdiff_core::Application;
/// use appdiff_review::select::path_prefix;
///
/// let app = Application::new("web", "https://github.com/acme/deploy", "apps/web/overlays/prod");
/// assert_eq!(path_prefix(&app), "apps/web");
/// ```
pub fn path_prefix(app: &Application) -> String {
    normalize_path(app.path())
        .split('/')
        .filter(|s| !s.is_empty())
        .take(PREFIX_SEGMENTS)
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_path(path: &str) -> &str {
    let path = path.trim();
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_start_matches('/')
}

/// Whether any changed file lives under the app's two-segment path prefix.
pub fn is_affected(app: &Application, changed_files: &[String]) -> bool {
    let prefix = path_prefix(app);
    changed_files
        .iter()
        .any(|file| normalize_path(file).starts_with(&prefix))
}

/// Apply the tracked, affected, and name filters, keeping inventory order.
///
/// # Examples
///
/// ```
/// use appdiff_core::Application;
/// use appdiff_review::select::{select_applications, NameMatcher};
///
/// let repo = "https://github.com/acme/deploy.git";
/// let apps = vec![
///     Application::new("a", repo, "apps/a"),
///     Application::new("b", repo, "apps/b/prod"),
///     Application::new("c", repo, "apps/c"),
/// ];
/// let changed = vec!["apps/b/base/deployment.yaml".to_string()];
/// let selected = select_applications(apps, "acme/deploy", &changed, &NameMatcher::All);
/// assert_eq!(selected.len(), 1);
/// assert_eq!(selected[0].name(), "b");
/// ```
pub fn select_applications(
    apps: Vec<Application>,
    repo_slug: &str,
    changed_files: &[String],
    matcher: &NameMatcher,
) -> Vec<Application> {
    let total = apps.len();

    let tracked: Vec<Application> = apps
        .into_iter()
        .filter(|app| is_tracked(app, repo_slug))
        .collect();
    let tracked_count = tracked.len();

    let affected: Vec<Application> = tracked
        .into_iter()
        .filter(|app| is_affected(app, changed_files))
        .collect();
    let affected_count = affected.len();

    let selected: Vec<Application> = affected
        .into_iter()
        .filter(|app| matcher.matches(app.name()))
        .collect();

    debug!(
        total,
        tracked = tracked_count,
        affected = affected_count,
        selected = selected.len(),
        "filtered application inventory"
    );
    selected
}
