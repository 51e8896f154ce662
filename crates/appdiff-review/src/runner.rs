//! Sequential `argocd app diff` execution.
//!
//! `argocd app diff` exits non-zero when it finds a difference, so the exit
//! code says little on its own. [`classify`] keys on stdout instead: any
//! output is a diff, and only a silent abnormal exit counts as a failure.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use appdiff_core::{Application, ArgoCdConfig, DiffFailure, DiffResult};
use appdiff_text::scrub::scrub_secrets;
use async_trait::async_trait;
use indicatif::ProgressBar;
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How the tool process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitState {
    /// Exit code 0.
    Success,
    /// Non-zero exit, or killed by a signal (`code` is `None`).
    Failed { code: Option<i32> },
    /// The process could not be started at all.
    SpawnFailed { message: String },
}

/// Raw result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// The command line that was run.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit: ExitState,
}

impl ToolOutput {
    fn error_value(&self) -> serde_json::Value {
        match &self.exit {
            ExitState::Success => json!({ "cmd": self.command, "code": 0 }),
            ExitState::Failed { code } => json!({
                "cmd": self.command,
                "code": code,
                "message": format!("Command failed: {}", self.command),
            }),
            ExitState::SpawnFailed { message } => json!({
                "cmd": self.command,
                "code": null,
                "message": message,
            }),
        }
    }
}

/// Turn a tool invocation into a [`DiffResult`].
///
/// # Examples
///
/// ```
/// use appdiff_core::Application;
/// use appdiff_review::runner::{classify, ExitState, ToolOutput};
///
/// let app = Application::new("x", "https://github.com/acme/deploy", "apps/x");
/// let output = ToolOutput {
///     command: "argocd app diff x".into(),
///     stdout: "--- a\n+++ b".into(),
///     stderr: String::new(),
///     exit: ExitState::Failed { code: Some(1) },
/// };
/// let result = classify(app, output);
/// assert_eq!(result.diff, "--- a\n+++ b");
/// assert!(result.failure.is_none());
/// ```
pub fn classify(app: Application, output: ToolOutput) -> DiffResult {
    if !output.stdout.trim().is_empty() {
        return DiffResult::with_diff(app, output.stdout);
    }
    match output.exit {
        ExitState::Success => DiffResult::clean(app),
        ExitState::Failed { .. } | ExitState::SpawnFailed { .. } => {
            let error = output.error_value();
            DiffResult::failed(
                app,
                DiffFailure {
                    stdout: output.stdout,
                    stderr: output.stderr,
                    error,
                },
            )
        }
    }
}

/// Something that can compute the diff for one application.
#[async_trait]
pub trait DiffTool: Send + Sync {
    async fn diff(&self, app: &Application) -> ToolOutput;
}

/// The `argocd` CLI.
///
/// # Examples
///
/// ```
/// use appdiff_core::{Application, ArgoCdConfig};
/// use appdiff_review::runner::ArgoCdCli;
///
/// let config = ArgoCdConfig {
///     server_url: "argocd.acme.dev".into(),
///     token: Some("t0k".into()),
///     extra_cli_args: "--grpc-web".into(),
///     ..ArgoCdConfig::default()
/// };
/// let cli = ArgoCdCli::new("argocd", &config);
/// let app = Application::new("web", "https://github.com/acme/deploy", "apps/web");
/// assert_eq!(
///     cli.args(&app),
///     vec![
///         "app", "diff", "web", "--local=apps/web", "--auth-token=t0k",
///         "--server=argocd.acme.dev", "--grpc-web",
///     ]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ArgoCdCli {
    binary: PathBuf,
    token: String,
    server: String,
    plaintext: bool,
    extra_args: Vec<String>,
}

impl ArgoCdCli {
    pub fn new(binary: impl Into<PathBuf>, config: &ArgoCdConfig) -> Self {
        Self {
            binary: binary.into(),
            token: config.token.clone().unwrap_or_default(),
            server: config.host().to_string(),
            plaintext: config.plaintext,
            extra_args: config.extra_args(),
        }
    }

    /// Arguments for `argocd app diff` on `app`.
    pub fn args(&self, app: &Application) -> Vec<String> {
        let mut args = vec![
            "app".to_string(),
            "diff".to_string(),
            app.name().to_string(),
            format!("--local={}", app.path()),
            format!("--auth-token={}", self.token),
            format!("--server={}", self.server),
        ];
        if self.plaintext {
            args.push("--plaintext".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl DiffTool for ArgoCdCli {
    async fn diff(&self, app: &Application) -> ToolOutput {
        let args = self.args(app);
        let command = format!("{} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => ToolOutput {
                command,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                exit: if output.status.success() {
                    ExitState::Success
                } else {
                    ExitState::Failed {
                        code: output.status.code(),
                    }
                },
            },
            Err(e) => ToolOutput {
                command,
                stdout: String::new(),
                stderr: String::new(),
                exit: ExitState::SpawnFailed {
                    message: e.to_string(),
                },
            },
        }
    }
}

/// Runs a [`DiffTool`] over applications one at a time, pausing between runs.
pub struct DiffRunner<'a> {
    tool: &'a dyn DiffTool,
    delay: Duration,
    progress: Option<ProgressBar>,
}

impl<'a> DiffRunner<'a> {
    pub fn new(tool: &'a dyn DiffTool, delay: Duration) -> Self {
        Self {
            tool,
            delay,
            progress: None,
        }
    }

    /// Report the current application on a spinner.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Diff every application in order. Never runs two tool processes at
    /// once; sleeps `delay` between consecutive runs but not after the last.
    /// A failing application is recorded and the loop moves on.
    pub async fn run(&self, apps: &[Application]) -> Vec<DiffResult> {
        let total = apps.len();
        let mut results = Vec::with_capacity(total);

        for (i, app) in apps.iter().enumerate() {
            if let Some(pb) = &self.progress {
                pb.set_message(format!("Diffing {} ({}/{total})", app.name(), i + 1));
            }
            info!(app = %app.name(), path = %app.path(), "running argocd app diff");

            let output = self.tool.diff(app).await;
            let result = classify(app.clone(), output);

            match &result.failure {
                Some(failure) => warn!(
                    app = %app.name(),
                    stderr = %scrub_secrets(failure.stderr.trim()),
                    error = %scrub_secrets(&failure.error.to_string()),
                    "diff tool failed"
                ),
                None if result.has_diff() => {
                    debug!(app = %app.name(), bytes = result.diff.len(), "diff found")
                }
                None => debug!(app = %app.name(), "no differences"),
            }
            results.push(result);

            if i + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        results
    }
}
