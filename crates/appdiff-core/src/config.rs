use std::path::{Path, PathBuf};

use appdiff_text::normalize::DEFAULT_NOISE_LABELS;
use serde::{Deserialize, Serialize};

use crate::error::AppDiffError;

/// Top-level configuration loaded from `.appdiff.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
/// The binary applies the first two layers on top of what this type parses.
///
/// # Examples
///
/// ```
/// use appdiff_core::AppDiffConfig;
///
/// let config = AppDiffConfig::default();
/// assert_eq!(config.diff.delay_ms, 2000);
/// assert!(config.diff.fail_on_errors);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppDiffConfig {
    /// Argo CD server and CLI settings.
    #[serde(default)]
    pub argocd: ArgoCdConfig,
    /// Diff runner settings.
    #[serde(default)]
    pub diff: DiffConfig,
    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

impl AppDiffConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Io`] if the file cannot be read, or
    /// [`AppDiffError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, AppDiffError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use appdiff_core::AppDiffConfig;
    ///
    /// let toml = r#"
    /// [argocd]
    /// server_url = "argocd.example.com"
    /// "#;
    /// let config = AppDiffConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.argocd.server_url, "argocd.example.com");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, AppDiffError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Check the settings a run cannot proceed without.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Config`] naming the first missing setting.
    pub fn validate(&self) -> Result<(), AppDiffError> {
        if self.argocd.server_url.trim().is_empty() {
            return Err(AppDiffError::Config(
                "argocd server URL not set. Pass --argocd-server-url or set ARGOCD_SERVER_URL"
                    .into(),
            ));
        }
        if self.argocd.token.as_deref().unwrap_or("").is_empty() {
            return Err(AppDiffError::Config(
                "argocd token not set. Pass --argocd-token or set ARGOCD_TOKEN".into(),
            ));
        }
        Ok(())
    }
}

/// Argo CD connection and CLI configuration.
///
/// # Examples
///
/// ```
/// use appdiff_core::ArgoCdConfig;
///
/// let config = ArgoCdConfig {
///     server_url: "https://argocd.example.com/".into(),
///     ..ArgoCdConfig::default()
/// };
/// assert_eq!(config.host(), "argocd.example.com");
/// assert_eq!(config.public_base_url(), "https://argocd.example.com");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgoCdConfig {
    /// Server host, with or without a scheme.
    #[serde(default)]
    pub server_url: String,
    /// Host used for links in the report, when it differs from `server_url`.
    pub public_url: Option<String>,
    /// Bearer token. Prefer the `ARGOCD_TOKEN` env var over the file.
    pub token: Option<String>,
    /// Talk plain HTTP instead of HTTPS.
    #[serde(default)]
    pub plaintext: bool,
    /// Extra arguments appended to every `argocd app diff` call.
    #[serde(default)]
    pub extra_cli_args: String,
    /// Explicit path to the `argocd` binary.
    pub binary: Option<PathBuf>,
    /// CLI release to download when no binary is given, e.g. `v2.11.3`.
    pub version: Option<String>,
}

impl ArgoCdConfig {
    /// Server host without scheme or trailing slash.
    pub fn host(&self) -> &str {
        strip_scheme(&self.server_url)
    }

    /// Base URL for report links: the public override if set, else the server.
    /// An override without a scheme is assumed to be HTTPS.
    pub fn public_base_url(&self) -> String {
        match self.public_url.as_deref().map(str::trim) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_string()
            }
            Some(url) if !url.is_empty() => format!("https://{}", url.trim_end_matches('/')),
            _ => format!("{}://{}", self.scheme(), self.host()),
        }
    }

    /// `http` when plaintext is enabled, else `https`.
    pub fn scheme(&self) -> &'static str {
        if self.plaintext {
            "http"
        } else {
            "https"
        }
    }

    /// Extra CLI arguments split on whitespace.
    pub fn extra_args(&self) -> Vec<String> {
        self.extra_cli_args
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

fn strip_scheme(url: &str) -> &str {
    let url = url.trim();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    url.trim_end_matches('/')
}

/// Diff runner configuration.
///
/// # Examples
///
/// ```
/// use appdiff_core::DiffConfig;
///
/// let config = DiffConfig::default();
/// assert_eq!(config.delay_ms, 2000);
/// assert!(config.app_name_matcher.is_empty());
/// assert_eq!(config.noise_labels.len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Pause between two consecutive diff tool invocations (default: 2000).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Fail the run when any application fails to diff (default: true).
    #[serde(default = "default_fail_on_errors")]
    pub fail_on_errors: bool,
    /// `/regex/`, a comma separated list of names, or empty for all apps.
    #[serde(default)]
    pub app_name_matcher: String,
    /// Label keys whose changes are stripped from diffs.
    #[serde(default = "default_noise_labels")]
    pub noise_labels: Vec<String>,
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_fail_on_errors() -> bool {
    true
}

fn default_noise_labels() -> Vec<String> {
    DEFAULT_NOISE_LABELS.iter().map(|l| l.to_string()).collect()
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            fail_on_errors: default_fail_on_errors(),
            app_name_matcher: String::new(),
            noise_labels: default_noise_labels(),
        }
    }
}

/// Report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Environment label embedded in the comment header (default: `"default"`).
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_environment() -> String {
    "default".into()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = AppDiffConfig::default();
        assert_eq!(config.diff.delay_ms, 2000);
        assert!(config.diff.fail_on_errors);
        assert!(config.diff.app_name_matcher.is_empty());
        assert_eq!(config.report.environment, "default");
        assert!(!config.argocd.plaintext);
        assert!(config.argocd.token.is_none());
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[argocd]
server_url = "argocd.internal:8080"
public_url = "https://argocd.acme.dev"
plaintext = true
extra_cli_args = "--grpc-web   --loglevel warn"
version = "v2.11.3"

[diff]
delay_ms = 500
fail_on_errors = false
app_name_matcher = "/^pay/"

[report]
environment = "staging"
"#;
        let config = AppDiffConfig::from_toml(toml).unwrap();
        assert_eq!(config.argocd.host(), "argocd.internal:8080");
        assert_eq!(config.argocd.public_base_url(), "https://argocd.acme.dev");
        assert_eq!(config.argocd.scheme(), "http");
        assert_eq!(
            config.argocd.extra_args(),
            vec!["--grpc-web", "--loglevel", "warn"]
        );
        assert_eq!(config.argocd.version.as_deref(), Some("v2.11.3"));
        assert_eq!(config.diff.delay_ms, 500);
        assert!(!config.diff.fail_on_errors);
        assert_eq!(config.diff.app_name_matcher, "/^pay/");
        assert_eq!(config.report.environment, "staging");
    }

    #[test]
    fn default_noise_labels_match_normalizer() {
        let config = DiffConfig::default();
        assert_eq!(config.noise_labels, DEFAULT_NOISE_LABELS.to_vec());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = AppDiffConfig::from_toml("").unwrap();
        assert_eq!(config.diff.delay_ms, 2000);
        assert!(config.diff.fail_on_errors);
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = AppDiffConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn blank_public_url_falls_back_to_server() {
        let config = ArgoCdConfig {
            server_url: "argocd.acme.dev".into(),
            public_url: Some("  ".into()),
            ..ArgoCdConfig::default()
        };
        assert_eq!(config.public_base_url(), "https://argocd.acme.dev");
    }

    #[test]
    fn public_url_without_scheme_gets_https() {
        let config = ArgoCdConfig {
            server_url: "argocd.internal".into(),
            plaintext: true,
            public_url: Some("argocd.acme.dev/".into()),
            ..ArgoCdConfig::default()
        };
        assert_eq!(config.public_base_url(), "https://argocd.acme.dev");
    }

    #[test]
    fn validate_requires_server_and_token() {
        let mut config = AppDiffConfig::default();
        assert!(config.validate().is_err());
        config.argocd.server_url = "argocd.acme.dev".into();
        assert!(config.validate().is_err());
        config.argocd.token = Some("t0k".into());
        assert!(config.validate().is_ok());
    }
}
