//! Remote artifact fetcher.

use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Abstraction over HTTP downloads.
///
/// Implementations must follow redirects and fail loudly on HTTP error
/// status instead of writing an error page as if it were the artifact.
pub trait Fetcher {
    /// Download `url` to `dest`, creating parent directories as needed.
    /// A failed download must not leave a partial file at `dest`.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;

    /// Fetch a small text body (release tags, stable-version lookups).
    fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP client with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("provisioner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        info!(url, dest = %dest.display(), "downloading artifact");
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request {url}"))?
            .error_for_status()
            .with_context(|| format!("download {url}"))?;

        // Stream into a sibling temp file and rename on success; an
        // interrupted body must not leave a truncated binary at `dest`.
        let file_name = dest
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("invalid destination {}", dest.display()))?;
        let tmp = dest.with_file_name(format!("{file_name}.part"));
        let mut file =
            File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        match response.copy_to(&mut file) {
            Ok(bytes) => {
                drop(file);
                fs::rename(&tmp, dest)
                    .with_context(|| format!("move download into {}", dest.display()))?;
                debug!(bytes, "download complete");
                Ok(())
            }
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&tmp);
                Err(err).with_context(|| format!("download body of {url}"))
            }
        }
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request {url}"))?
            .error_for_status()
            .with_context(|| format!("fetch {url}"))?
            .text()
            .with_context(|| format!("read body of {url}"))?;
        Ok(body)
    }
}

/// Mark a freshly written binary as executable (mode 0755).
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
        .with_context(|| format!("chmod {}", path.display()))?;
    Ok(())
}
