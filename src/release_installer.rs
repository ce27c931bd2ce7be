use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{OperatorError, Result};
use crate::layout::SERVICE_NAME;

/// One versioned release of the exporter for one architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifact {
    pub version: String,
    pub arch: String,
    pub url: String,
}

impl ReleaseArtifact {
    pub fn new(base_url: &str, version: &str, arch: &str) -> Self {
        let url = format!(
            "{}/{name}/releases/download/v{version}/{name}-{version}.linux-{arch}.tar.gz",
            base_url.trim_end_matches('/'),
            name = SERVICE_NAME,
            version = version,
            arch = arch,
        );
        Self {
            version: version.to_string(),
            arch: arch.to_string(),
            url,
        }
    }

    /// Top-level folder inside the release tarball.
    pub fn archive_root(&self) -> String {
        format!("{}-{}.linux-{}", SERVICE_NAME, self.version, self.arch)
    }
}

/// Extracted release whose executable waits at [`StagedArtifact::binary`].
/// The extraction directory is deleted when this value is dropped.
#[derive(Debug)]
pub struct StagedArtifact {
    pub release: ReleaseArtifact,
    pub binary: PathBuf,
    _dir: TempDir,
}

/// Removes the downloaded archive on every exit path.
struct ArchiveGuard<'a>(&'a Path);

impl Drop for ArchiveGuard<'_> {
    fn drop(&mut self) {
        match std::fs::remove_file(self.0) {
            Ok(()) => debug!(path = %self.0.display(), "Removed staging archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.0.display(), error = %e, "Failed to remove staging archive"),
        }
    }
}

pub struct ReleaseFetcher {
    base_url: String,
    arch: String,
    staging_archive: PathBuf,
    timeout: Duration,
}

impl ReleaseFetcher {
    pub fn new(base_url: &str, arch: &str, staging_archive: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.to_string(),
            arch: arch.to_string(),
            staging_archive: staging_archive.into(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn release(&self, version: &str) -> ReleaseArtifact {
        ReleaseArtifact::new(&self.base_url, version, &self.arch)
    }

    /// Downloads and unpacks `version`, returning the staged executable.
    pub async fn fetch(&self, version: &str) -> Result<StagedArtifact> {
        let release = self.release(version);
        debug!(version, arch = %self.arch, url = %release.url, "Fetching release");

        if let Some(parent) = self.staging_archive.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let _guard = ArchiveGuard(&self.staging_archive);
        self.download(&release.url).await?;

        let staging_parent = self
            .staging_archive
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let dir = tempfile::Builder::new()
            .prefix("zfs-exporter-")
            .tempdir_in(staging_parent)?;

        let binary = extract_release(&self.staging_archive, dir.path(), &release)?;
        debug!(binary = %binary.display(), "Release staged");

        Ok(StagedArtifact {
            release,
            binary,
            _dir: dir,
        })
    }

    async fn download(&self, url: &str) -> Result<()> {
        let fetch_err = |reason: String| OperatorError::Fetch {
            url: url.to_string(),
            reason,
        };

        let client = reqwest::Client::builder()
            .user_agent(concat!("zfs-exporter-operator/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .map_err(|e| fetch_err(format!("failed to create HTTP client: {}", e)))?;

        let mut response = client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(describe_request_error(&e, self.timeout)))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("server returned status {}", response.status())));
        }

        let mut file = tokio::fs::File::create(&self.staging_archive).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_err(describe_request_error(&e, self.timeout)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(bytes = written, path = %self.staging_archive.display(), "Download complete");
        Ok(())
    }
}

fn describe_request_error(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("timed out after {}s", timeout.as_secs())
    } else {
        e.to_string()
    }
}

/// Unpacks `archive` into `dest` and locates the exporter binary under the
/// release's top-level folder.
pub fn extract_release(archive: &Path, dest: &Path, release: &ReleaseArtifact) -> Result<PathBuf> {
    let file = File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.unpack(dest).map_err(|e| {
        OperatorError::Archive(format!("failed to unpack {}: {}", archive.display(), e))
    })?;

    let binary = dest.join(release.archive_root()).join(SERVICE_NAME);
    if !binary.is_file() {
        return Err(OperatorError::Archive(format!(
            "{}/{} not found in release archive",
            release.archive_root(),
            SERVICE_NAME
        )));
    }
    Ok(binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_archive, release_archive, serve_file, serve_release};

    #[test]
    fn test_release_url_convention() {
        let release = ReleaseArtifact::new("https://github.com/pdf/", "2.3.4", "arm64");
        assert_eq!(
            release.url,
            "https://github.com/pdf/zfs_exporter/releases/download/v2.3.4/zfs_exporter-2.3.4.linux-arm64.tar.gz"
        );
        assert_eq!(release.archive_root(), "zfs_exporter-2.3.4.linux-arm64");
    }

    #[test]
    fn test_extract_finds_nested_binary() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("release.tar.gz");
        std::fs::write(&archive, release_archive("0.9.1", "amd64")).unwrap();
        let dest = tmp.path().join("out");
        std::fs::create_dir(&dest).unwrap();

        let release = ReleaseArtifact::new("http://x", "0.9.1", "amd64");
        let binary = extract_release(&archive, &dest, &release).unwrap();

        assert_eq!(binary, dest.join("zfs_exporter-0.9.1.linux-amd64/zfs_exporter"));
        assert!(binary.is_file());
    }

    #[test]
    fn test_extract_rejects_wrong_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("release.tar.gz");
        std::fs::write(&archive, build_archive(&[("zfs_exporter", b"flat".as_slice())])).unwrap();

        let release = ReleaseArtifact::new("http://x", "0.9.1", "amd64");
        let err = extract_release(&archive, tmp.path(), &release).unwrap_err();
        assert!(matches!(err, OperatorError::Archive(_)), "{err}");
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("release.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let release = ReleaseArtifact::new("http://x", "0.9.1", "amd64");
        let err = extract_release(&archive, tmp.path(), &release).unwrap_err();
        assert!(matches!(err, OperatorError::Archive(_)), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_stages_binary_and_removes_archive() {
        let server = serve_release("0.9.1", "amd64").await;
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("tmp/zfs-exporter.tar.gz");

        let fetcher = ReleaseFetcher::new(&server.uri(), "amd64", &staging);
        let staged = fetcher.fetch("0.9.1").await.unwrap();

        assert!(staged.binary.is_file());
        assert_eq!(staged.release.version, "0.9.1");
        assert!(!staging.exists());

        let dir = staged.binary.parent().unwrap().parent().unwrap().to_path_buf();
        drop(staged);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_fetch_http_error_is_fetch_error() {
        let server = serve_release("0.9.1", "amd64").await;
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("zfs-exporter.tar.gz");

        let fetcher = ReleaseFetcher::new(&server.uri(), "amd64", &staging);
        let err = fetcher.fetch("9.9.9").await.unwrap_err();

        assert!(matches!(err, OperatorError::Fetch { .. }), "{err}");
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn test_fetch_archive_error_still_cleans_up() {
        let path = "/zfs_exporter/releases/download/v1.0.0/zfs_exporter-1.0.0.linux-amd64.tar.gz";
        let server = serve_file(path.to_string(), build_archive(&[("README", b"hi".as_slice())])).await;
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("zfs-exporter.tar.gz");

        let fetcher = ReleaseFetcher::new(&server.uri(), "amd64", &staging);
        let err = fetcher.fetch("1.0.0").await.unwrap_err();

        assert!(matches!(err, OperatorError::Archive(_)), "{err}");
        assert!(!staging.exists());
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_stalled_server() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("zfs-exporter.tar.gz");

        let fetcher = ReleaseFetcher::new(&server.uri(), "amd64", &staging)
            .with_timeout(Duration::from_secs(1));
        let err = fetcher.fetch("0.9.1").await.unwrap_err();

        assert!(matches!(err, OperatorError::Fetch { .. }), "{err}");
        assert!(err.to_string().contains("timed out"), "{err}");
        assert_eq!(err.kind(), "fetch-error");
        assert!(!staging.exists());
    }
}
