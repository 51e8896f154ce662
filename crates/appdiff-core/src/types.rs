use std::fmt;

use serde::{Deserialize, Serialize};

/// One deployable unit known to the Argo CD server.
///
/// Mirrors the subset of the `Application` resource returned by
/// `GET /api/v1/applications` that appdiff reads. Fields it does not
/// understand are ignored; the templating configuration is kept opaque.
///
/// # Examples
///
/// ```
/// use appdiff_core::{Application, SyncStatus};
///
/// let app = Application::new("payments", "https://github.com/acme/deploy.git", "apps/payments/prod");
/// assert_eq!(app.name(), "payments");
/// assert_eq!(app.sync_status(), SyncStatus::InSync);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Object metadata (name).
    pub metadata: ApplicationMetadata,
    /// Desired state: where the manifests come from.
    pub spec: ApplicationSpec,
    /// Observed state reported by the server.
    #[serde(default)]
    pub status: ApplicationStatus,
}

/// `metadata` block of an [`Application`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    /// Unique name within the server's inventory.
    pub name: String,
}

/// `spec` block of an [`Application`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    /// Single-source descriptor. Multi-source apps carry `sources` instead
    /// and leave this unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ApplicationSource>,
}

/// Source descriptor: repository, path inside it, and tracked revision.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    /// Git repository URL.
    #[serde(rename = "repoURL", default)]
    pub repo_url: String,
    /// Path of the manifests inside the repository.
    #[serde(default)]
    pub path: String,
    /// Branch, tag, or commit tracked by the app. Empty means the primary branch.
    #[serde(default)]
    pub target_revision: String,
    /// Helm settings, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm: Option<serde_json::Value>,
    /// Kustomize settings, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kustomize: Option<serde_json::Value>,
    /// Plain directory settings, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<serde_json::Value>,
}

/// `status` block of an [`Application`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplicationStatus {
    /// Sync information.
    #[serde(default)]
    pub sync: SyncInfo,
}

/// `status.sync` block of an [`Application`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncInfo {
    /// Whether live state matches desired state.
    #[serde(default)]
    pub status: SyncStatus,
}

/// Whether the live deployed state matches the declared desired state.
///
/// The server reports `Synced`, `OutOfSync`, or `Unknown`; anything other
/// than `Synced` is treated as out of sync.
///
/// # Examples
///
/// ```
/// use appdiff_core::SyncStatus;
///
/// let s: SyncStatus = serde_json::from_str("\"Synced\"").unwrap();
/// assert_eq!(s, SyncStatus::InSync);
/// let s: SyncStatus = serde_json::from_str("\"Unknown\"").unwrap();
/// assert_eq!(s, SyncStatus::OutOfSync);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncStatus {
    /// Live state matches the desired state.
    #[default]
    InSync,
    /// Live state has drifted, or the server could not tell.
    OutOfSync,
}

impl From<String> for SyncStatus {
    fn from(s: String) -> Self {
        if s == "Synced" {
            SyncStatus::InSync
        } else {
            SyncStatus::OutOfSync
        }
    }
}

impl From<SyncStatus> for String {
    fn from(s: SyncStatus) -> Self {
        match s {
            SyncStatus::InSync => "Synced".into(),
            SyncStatus::OutOfSync => "OutOfSync".into(),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::InSync => write!(f, "synced"),
            SyncStatus::OutOfSync => write!(f, "out-of-sync"),
        }
    }
}

impl Application {
    /// Build an in-sync application tracking the primary branch.
    pub fn new(name: &str, repo_url: &str, path: &str) -> Self {
        Self {
            metadata: ApplicationMetadata { name: name.into() },
            spec: ApplicationSpec {
                source: Some(ApplicationSource {
                    repo_url: repo_url.into(),
                    path: path.into(),
                    ..ApplicationSource::default()
                }),
            },
            status: ApplicationStatus::default(),
        }
    }

    /// Set the tracked revision.
    pub fn with_revision(mut self, revision: &str) -> Self {
        if let Some(source) = &mut self.spec.source {
            source.target_revision = revision.into();
        }
        self
    }

    /// Set the sync status.
    pub fn with_sync_status(mut self, status: SyncStatus) -> Self {
        self.status.sync.status = status;
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Whether the app is deployed from exactly one `spec.source`.
    pub fn has_single_source(&self) -> bool {
        self.spec.source.is_some()
    }

    /// Repository URL, empty for multi-source apps.
    pub fn repo_url(&self) -> &str {
        self.spec.source.as_ref().map_or("", |s| s.repo_url.as_str())
    }

    pub fn path(&self) -> &str {
        self.spec.source.as_ref().map_or("", |s| s.path.as_str())
    }

    pub fn target_revision(&self) -> &str {
        self.spec
            .source
            .as_ref()
            .map_or("", |s| s.target_revision.as_str())
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.status.sync.status
    }
}

/// Captured output of a diff tool run that ended abnormally without
/// producing diff text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffFailure {
    /// Standard output (empty by construction, kept for the report).
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// The underlying process failure, serialized.
    pub error: serde_json::Value,
}

/// Outcome of running the diff tool for one [`Application`].
///
/// Holds either diff text, a failure record, or neither (clean run).
///
/// # Examples
///
/// ```
/// use appdiff_core::{Application, DiffResult};
///
/// let app = Application::new("web", "https://github.com/acme/deploy", "apps/web");
/// let result = DiffResult::clean(app);
/// assert!(!result.has_diff());
/// assert!(!result.is_failed());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// The application the diff belongs to.
    pub app: Application,
    /// Diff text; empty means no differences.
    pub diff: String,
    /// Present exactly when the tool failed without producing diff text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<DiffFailure>,
}

impl DiffResult {
    /// A clean run: no differences, no failure.
    pub fn clean(app: Application) -> Self {
        Self {
            app,
            diff: String::new(),
            failure: None,
        }
    }

    /// A run that produced diff text.
    pub fn with_diff(app: Application, diff: impl Into<String>) -> Self {
        Self {
            app,
            diff: diff.into(),
            failure: None,
        }
    }

    /// A run that failed.
    pub fn failed(app: Application, failure: DiffFailure) -> Self {
        Self {
            app,
            diff: String::new(),
            failure: Some(failure),
        }
    }

    pub fn has_diff(&self) -> bool {
        !self.diff.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Overall verdict for a run.
///
/// # Examples
///
/// ```
/// use appdiff_core::Outcome;
///
/// assert!(Outcome::Warning("1 errors out of 3 apps".into()).exit_success());
/// assert!(!Outcome::Failed("All 3 apps failed".into()).exit_success());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum Outcome {
    /// Every application produced a diff or a clean result.
    Success,
    /// Some applications failed but the failure policy is lenient.
    Warning(String),
    /// The run failed.
    Failed(String),
}

impl Outcome {
    /// Whether the process should exit with code 0.
    pub fn exit_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Warning(msg) => write!(f, "warning: {msg}"),
            Outcome::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY_ITEM: &str = r#"{
        "metadata": {"name": "payments", "namespace": "argocd"},
        "spec": {
            "project": "default",
            "source": {
                "repoURL": "https://github.com/acme/deploy.git",
                "path": "apps/payments/prod",
                "targetRevision": "main",
                "helm": {"valueFiles": ["values.yaml"]}
            }
        },
        "status": {"sync": {"status": "OutOfSync", "revision": "abc"}}
    }"#;

    #[test]
    fn application_parses_inventory_item() {
        let app: Application = serde_json::from_str(INVENTORY_ITEM).unwrap();
        assert_eq!(app.name(), "payments");
        assert_eq!(app.repo_url(), "https://github.com/acme/deploy.git");
        assert_eq!(app.path(), "apps/payments/prod");
        assert_eq!(app.target_revision(), "main");
        assert_eq!(app.sync_status(), SyncStatus::OutOfSync);
        assert!(app.spec.source.as_ref().unwrap().helm.is_some());
        assert!(app.has_single_source());
    }

    #[test]
    fn multi_source_application_parses_without_source() {
        let json = r#"{
            "metadata": {"name": "multi"},
            "spec": {"sources": [
                {"repoURL": "https://github.com/acme/deploy.git", "path": "apps/multi"},
                {"repoURL": "https://charts.acme.dev", "chart": "multi"}
            ]}
        }"#;
        let app: Application = serde_json::from_str(json).unwrap();
        assert!(!app.has_single_source());
        assert_eq!(app.repo_url(), "");
        assert_eq!(app.path(), "");
    }

    #[test]
    fn application_without_status_defaults_to_synced() {
        let json = r#"{"metadata":{"name":"x"},"spec":{"source":{"repoURL":"r","path":"p"}}}"#;
        let app: Application = serde_json::from_str(json).unwrap();
        assert_eq!(app.sync_status(), SyncStatus::InSync);
        assert_eq!(app.target_revision(), "");
    }

    #[test]
    fn sync_status_roundtrips_wire_names() {
        assert_eq!(serde_json::to_string(&SyncStatus::InSync).unwrap(), "\"Synced\"");
        assert_eq!(
            serde_json::to_string(&SyncStatus::OutOfSync).unwrap(),
            "\"OutOfSync\""
        );
    }

    #[test]
    fn diff_result_constructors() {
        let app = Application::new("a", "r", "p");
        let with_diff = DiffResult::with_diff(app.clone(), "--- a\n+++ b");
        assert!(with_diff.has_diff());
        assert!(!with_diff.is_failed());

        let failed = DiffResult::failed(
            app,
            DiffFailure {
                stdout: String::new(),
                stderr: "connection refused".into(),
                error: serde_json::json!({"code": 20}),
            },
        );
        assert!(failed.is_failed());
        assert!(!failed.has_diff());
    }

    #[test]
    fn outcome_display() {
        assert_eq!(Outcome::Success.to_string(), "success");
        assert_eq!(
            Outcome::Failed("2 errors out of 5 apps".into()).to_string(),
            "failed: 2 errors out of 5 apps"
        );
    }
}
