//! Locate, or download, the `argocd` CLI used to compute diffs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use appdiff_core::{AppDiffError, ArgoCdConfig};
use tracing::info;

const RELEASE_BASE: &str = "https://github.com/argoproj/argo-cd/releases/download";

/// Release asset name for the current platform, e.g. `argocd-linux-amd64`.
///
/// # Errors
///
/// Returns [`AppDiffError::ToolInvocation`] on a platform Argo CD does not ship.
pub fn asset_name(os: &str, arch: &str) -> Result<String, AppDiffError> {
    let os = match os {
        "linux" => "linux",
        "macos" => "darwin",
        "windows" => "windows",
        other => {
            return Err(AppDiffError::ToolInvocation(format!(
                "no argocd release for OS '{other}'"
            )))
        }
    };
    let arch = match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => {
            return Err(AppDiffError::ToolInvocation(format!(
                "no argocd release for architecture '{other}'"
            )))
        }
    };
    let ext = if os == "windows" { ".exe" } else { "" };
    Ok(format!("argocd-{os}-{arch}{ext}"))
}

/// Download URL for a release of the CLI.
///
/// # Examples
///
/// ```
/// use appdiff_review::install::release_url;
///
/// let url = release_url("v2.11.3", "linux", "x86_64").unwrap();
/// assert_eq!(
///     url,
///     "https://github.com/argoproj/argo-cd/releases/download/v2.11.3/argocd-linux-amd64"
/// );
/// ```
pub fn release_url(version: &str, os: &str, arch: &str) -> Result<String, AppDiffError> {
    Ok(format!("{RELEASE_BASE}/{version}/{}", asset_name(os, arch)?))
}

/// Default directory for downloaded binaries.
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("appdiff")
}

/// Resolve the CLI binary to run.
///
/// An explicit `binary` wins; otherwise a configured `version` is downloaded
/// into `cache_dir` (once); otherwise `argocd` is looked up on `PATH`.
///
/// # Errors
///
/// Returns [`AppDiffError::ToolInvocation`] if the configured binary does not
/// exist or the download fails.
pub async fn resolve_binary(
    config: &ArgoCdConfig,
    cache_dir: &Path,
) -> Result<PathBuf, AppDiffError> {
    if let Some(binary) = &config.binary {
        if !binary.exists() {
            return Err(AppDiffError::ToolInvocation(format!(
                "argocd binary not found at {}",
                binary.display()
            )));
        }
        return Ok(binary.clone());
    }

    let Some(version) = config.version.as_deref().filter(|v| !v.is_empty()) else {
        return Ok(PathBuf::from("argocd"));
    };

    let target = cache_dir.join(format!("argocd-{version}"));
    if target.exists() {
        return Ok(target);
    }

    let url = release_url(version, std::env::consts::OS, std::env::consts::ARCH)?;
    info!(%url, "downloading argocd CLI");
    download(&url, &target).await?;
    Ok(target)
}

async fn download(url: &str, target: &Path) -> Result<(), AppDiffError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| AppDiffError::ToolInvocation(format!("failed to create HTTP client: {e}")))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppDiffError::ToolInvocation(format!("failed to download {url}: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppDiffError::ToolInvocation(format!(
            "download of {url} failed with {status}"
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppDiffError::ToolInvocation(format!("failed to read {url}: {e}")))?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // The cache only ever holds complete binaries.
    let mut partial = target.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    tokio::fs::write(&partial, &bytes).await?;
    make_executable(&partial).await?;
    tokio::fs::rename(&partial, target).await?;
    Ok(())
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), AppDiffError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), AppDiffError> {
    Ok(())
}
