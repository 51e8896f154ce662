use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use appdiff_core::AppDiffConfig;
use appdiff_review::argocd::ArgoCdClient;
use appdiff_review::github::{GitHubClient, PullRequestContext, PullRequestRef};
use appdiff_review::install;
use appdiff_review::pipeline::{Pipeline, PipelineSettings};
use appdiff_review::runner::ArgoCdCli;
use appdiff_text::scrub::{scrub_secrets, MASK};
use chrono::Local;
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = ".appdiff.toml";

#[derive(Parser)]
#[command(
    name = "appdiff",
    version,
    about = "Argo CD diff reports for pull requests",
    long_about = "appdiff shows what a pull request changes in every Argo CD application it touches.\n\n\
                   For each affected app it runs `argocd app diff --local` against the live\n\
                   cluster state and posts one summary comment on the pull request, replacing\n\
                   the previous report for the same environment.\n\n\
                   Examples:\n  \
                     appdiff run                                  Run inside a GitHub Actions PR job\n  \
                     appdiff run --pr acme/deploy#42 --sha 1a2b3c  Run against a specific PR\n  \
                     appdiff run --dry-run                        Print the report instead of posting it\n  \
                     appdiff init                                 Create a .appdiff.toml template"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .appdiff.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Diff affected Argo CD apps and report on the pull request
    #[command(long_about = "Diff affected Argo CD apps and report on the pull request.\n\n\
        Settings come from flags and environment variables first, then the config\n\
        file, then built-in defaults. Inside GitHub Actions the pull request is read\n\
        from GITHUB_REPOSITORY and GITHUB_EVENT_PATH.\n\n\
        Exits non-zero when the change set or the app inventory cannot be fetched,\n\
        or when any app fails to diff and --fail-on-errors is in effect.")]
    Run(RunArgs),
    /// Create a default .appdiff.toml configuration file
    #[command(long_about = "Create a default .appdiff.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .appdiff.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Argo CD server host, with or without a scheme
    #[arg(long, env = "ARGOCD_SERVER_URL")]
    argocd_server_url: Option<String>,

    /// Host used for app links in the report
    #[arg(long, env = "ARGOCD_PUBLIC_URL")]
    argocd_public_url: Option<String>,

    /// Argo CD API token
    #[arg(long, env = "ARGOCD_TOKEN", hide_env_values = true)]
    argocd_token: Option<String>,

    /// argocd CLI release to download, e.g. v2.11.3
    #[arg(long, env = "ARGOCD_VERSION")]
    argocd_version: Option<String>,

    /// Path to an existing argocd binary (skips the download)
    #[arg(long)]
    argocd_binary: Option<PathBuf>,

    /// Talk plain HTTP to the Argo CD server
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    plaintext: Option<bool>,

    /// Extra arguments appended to every `argocd app diff` call
    #[arg(long, allow_hyphen_values = true)]
    extra_cli_args: Option<String>,

    /// Environment label in the comment header (default: "default")
    #[arg(long)]
    environment: Option<String>,

    /// Milliseconds to wait between two diff invocations (default: 2000)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Fail the run when any app fails to diff (default: true)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    fail_on_errors: Option<bool>,

    /// Restrict apps by name: `/regex/` or a comma separated list
    #[arg(long)]
    app_name_matcher: Option<String>,

    /// GitHub token for reading the PR and managing comments
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Pull request to report on (format: owner/repo#123)
    #[arg(long, requires = "sha")]
    pr: Option<String>,

    /// Head commit SHA of the pull request
    #[arg(long, requires = "pr")]
    sha: Option<String>,

    /// Print the report to stdout instead of posting it
    #[arg(long)]
    dry_run: bool,
}

/// Layer flag and environment values over the file configuration.
fn apply_overrides(config: &mut AppDiffConfig, args: &RunArgs) {
    let argocd = &mut config.argocd;
    if let Some(v) = &args.argocd_server_url {
        argocd.server_url = v.clone();
    }
    if let Some(v) = &args.argocd_public_url {
        argocd.public_url = Some(v.clone());
    }
    if let Some(v) = &args.argocd_token {
        argocd.token = Some(v.clone());
    }
    if let Some(v) = &args.argocd_version {
        argocd.version = Some(v.clone());
    }
    if let Some(v) = &args.argocd_binary {
        argocd.binary = Some(v.clone());
    }
    if let Some(v) = args.plaintext {
        argocd.plaintext = v;
    }
    if let Some(v) = &args.extra_cli_args {
        argocd.extra_cli_args = v.clone();
    }

    if let Some(v) = args.delay_ms {
        config.diff.delay_ms = v;
    }
    if let Some(v) = args.fail_on_errors {
        config.diff.fail_on_errors = v;
    }
    if let Some(v) = &args.app_name_matcher {
        config.diff.app_name_matcher = v.clone();
    }
    if let Some(v) = &args.environment {
        config.report.environment = v.clone();
    }
}

fn load_config(path: Option<&Path>) -> Result<AppDiffConfig> {
    match path {
        Some(path) => Ok(AppDiffConfig::from_file(path)?),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                Ok(AppDiffConfig::from_file(default_path)?)
            } else {
                Ok(AppDiffConfig::default())
            }
        }
    }
}

/// Log sink that masks known secrets before anything reaches stderr.
///
/// When a spinner is attached, it is hidden while a line is written.
#[derive(Clone)]
struct ScrubbingWriter {
    secrets: Vec<String>,
    progress: Option<ProgressBar>,
}

impl ScrubbingWriter {
    fn new(secrets: impl IntoIterator<Item = Option<String>>) -> Self {
        Self {
            secrets: secrets
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect(),
            progress: None,
        }
    }

    fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    fn scrub(&self, line: &str) -> String {
        let mut out = scrub_secrets(line);
        for secret in &self.secrets {
            out = out.replace(secret.as_str(), MASK);
        }
        out
    }
}

impl Write for ScrubbingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let line = self.scrub(&String::from_utf8_lossy(buf));
        match &self.progress {
            Some(pb) => pb.suspend(|| std::io::stderr().write_all(line.as_bytes()))?,
            None => std::io::stderr().write_all(line.as_bytes())?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

fn init_logging(verbose: bool, writer: ScrubbingWriter) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(move || writer.clone())
        .init();
}

fn pull_request_context(args: &RunArgs) -> Result<PullRequestContext> {
    match (&args.pr, &args.sha) {
        (Some(pr), Some(sha)) => Ok(PullRequestContext {
            pr: pr.parse::<PullRequestRef>()?,
            head_sha: sha.clone(),
        }),
        _ => Ok(PullRequestContext::from_actions_env()?),
    }
}

/// Spinner for interactive runs. It stays invisible until it starts ticking.
fn spinner() -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    Some(pb)
}

async fn run(config_path: Option<&Path>, verbose: bool, args: RunArgs) -> Result<bool> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);

    let progress = spinner();
    init_logging(
        verbose,
        ScrubbingWriter::new([config.argocd.token.clone(), args.github_token.clone()])
            .with_progress(progress.clone()),
    );

    config.validate()?;
    let pr_ctx = pull_request_context(&args)?;
    tracing::info!(
        pr = %pr_ctx.pr,
        sha = %pr_ctx.head_sha,
        environment = %config.report.environment,
        "starting diff run"
    );

    let binary = install::resolve_binary(&config.argocd, &install::default_cache_dir()).await?;
    tracing::debug!(binary = %binary.display(), "using argocd CLI");

    let tool = ArgoCdCli::new(binary, &config.argocd);
    let inventory = ArgoCdClient::new(&config.argocd)?;
    let host = GitHubClient::new(args.github_token.as_deref(), pr_ctx.pr.clone())?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S %:z").to_string();
    let mut settings = PipelineSettings::from_config(&config, &pr_ctx, timestamp)?;
    settings.dry_run = args.dry_run;

    let mut pipeline = Pipeline::new(&host, &inventory, &tool, settings);
    if let Some(pb) = progress {
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pipeline = pipeline.with_progress(pb);
    }
    let report = pipeline.run().await?;

    if args.dry_run {
        match report.publish.as_ref().and_then(|p| p.document.as_deref()) {
            Some(document) => println!("{document}"),
            None => eprintln!("Nothing to report: no diffs or errors."),
        }
    }

    tracing::info!(outcome = %report.outcome, "run finished");
    Ok(report.outcome.exit_success())
}

const DEFAULT_CONFIG: &str = r#"# appdiff Configuration
# See: https://github.com/Meru143/appdiff
#
# Flags and environment variables override anything set here.

[argocd]
# server_url = "argocd.example.com"     # or ARGOCD_SERVER_URL
# public_url = "argocd.example.com"     # host used for links in the report
# token = "..."                         # prefer ARGOCD_TOKEN
# plaintext = false
# extra_cli_args = "--grpc-web"
# version = "v2.11.3"                   # argocd CLI release to download
# binary = "/usr/local/bin/argocd"      # use an existing CLI instead

[diff]
# delay_ms = 2000
# fail_on_errors = true
# app_name_matcher = ""                 # "/^web-/" or "web,api"
# noise_labels = ["app.kubernetes.io/instance", "argocd.argoproj.io/instance"]

[report]
# environment = "default"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let success = run(cli.config.as_deref(), cli.verbose, args).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Command::Init => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                miette::bail!("{DEFAULT_CONFIG_PATH} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {DEFAULT_CONFIG_PATH} with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "appdiff", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = AppDiffConfig::from_toml(
            r#"
[argocd]
server_url = "argocd.file.dev"
plaintext = true

[diff]
delay_ms = 500
"#,
        )
        .unwrap();
        let args = RunArgs {
            argocd_server_url: Some("argocd.flag.dev".into()),
            plaintext: Some(false),
            fail_on_errors: Some(false),
            environment: Some("staging".into()),
            ..RunArgs::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.argocd.server_url, "argocd.flag.dev");
        assert!(!config.argocd.plaintext);
        assert_eq!(config.diff.delay_ms, 500);
        assert!(!config.diff.fail_on_errors);
        assert_eq!(config.report.environment, "staging");
    }

    #[test]
    fn bare_boolean_flags_mean_true() {
        let cli = Cli::try_parse_from(["appdiff", "run", "--plaintext", "--fail-on-errors"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.plaintext, Some(true));
        assert_eq!(args.fail_on_errors, Some(true));

        let cli = Cli::try_parse_from(["appdiff", "run", "--fail-on-errors", "false"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.fail_on_errors, Some(false));
    }

    #[test]
    fn pr_requires_sha() {
        assert!(Cli::try_parse_from(["appdiff", "run", "--pr", "acme/deploy#1"]).is_err());
    }

    #[test]
    fn writer_with_spinner_writes_whole_buffer() {
        let pb = ProgressBar::hidden();
        let mut writer =
            ScrubbingWriter::new([Some("ghp_abc".into())]).with_progress(Some(pb.clone()));
        let line = b"INFO posted diff report\n";
        assert_eq!(writer.write(line).unwrap(), line.len());
        writer.flush().unwrap();
        assert!(!pb.is_finished());
    }

    #[test]
    fn writer_masks_known_secrets() {
        let writer = ScrubbingWriter::new([Some("ghp_abc".into()), None, Some(String::new())]);
        assert_eq!(
            writer.scrub("token ghp_abc --auth-token=s3cr3t then s3cr3t"),
            "token *** --auth-token=*** then ***"
        );
    }
}
