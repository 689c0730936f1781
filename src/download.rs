use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::storage::{StoragePaths, file_present_nonempty, tmp_path};

/// Where the geocoded clinic list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl From<&str> for DataSource {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.starts_with("http://") || s.starts_with("https://") {
            DataSource::Url(s.to_string())
        } else {
            DataSource::File(PathBuf::from(s))
        }
    }
}

/// Produces the raw dataset JSON. Only called when the cache cannot be used.
pub trait SourceFetcher {
    fn fetch(&self) -> impl Future<Output = anyhow::Result<String>> + Send;
}

#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub source: DataSource,
    pub paths: StoragePaths,
    pub force_download: bool,
}

impl SourceFetcher for SourceFetch {
    async fn fetch(&self) -> anyhow::Result<String> {
        let path = ensure_source(&self.paths, &self.source, self.force_download).await?;
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read {}", path.display()))
    }
}

/// Returns a local path holding the dataset, downloading it first for URL sources.
pub async fn ensure_source(
    paths: &StoragePaths,
    source: &DataSource,
    force: bool,
) -> anyhow::Result<PathBuf> {
    match source {
        DataSource::File(p) => {
            if !file_present_nonempty(p) {
                return Err(anyhow!("Dataset file missing or empty: {}", p.display()));
            }
            Ok(p.clone())
        }
        DataSource::Url(url) => {
            paths.ensure_dirs().context("create data directories")?;
            let dest = paths.source_file();
            ensure_download(url, &dest, force).await?;
            Ok(dest)
        }
    }
}

async fn ensure_download(url: &str, dest: &Path, force: bool) -> anyhow::Result<()> {
    if !force && file_present_nonempty(dest) {
        tracing::info!("Reusing downloaded dataset at {}", dest.display());
        return Ok(());
    }

    tracing::info!("Fetching clinics dataset from {}", url);
    let resp = reqwest::Client::new()
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!("Dataset download failed ({status}): {url}"));
    }
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if content_type.starts_with("text/html") {
        return Err(anyhow!("Dataset URL returned an HTML page, not JSON: {url}"));
    }

    let tmp = tmp_path(dest);
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .with_context(|| format!("create {}", tmp.display()))?;

    let mut received: u64 = 0;
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("read dataset body from {url}"))?;
        received += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    if received == 0 {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(anyhow!("Dataset download was empty: {url}"));
    }

    tokio::fs::rename(&tmp, dest)
        .await
        .with_context(|| format!("rename {} -> {}", tmp.display(), dest.display()))?;
    tracing::info!(
        "Saved {} KiB of clinic data to {}",
        received.div_ceil(1024),
        dest.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn classifies_sources() {
        assert_eq!(
            DataSource::from("https://example.org/clinics.json"),
            DataSource::Url("https://example.org/clinics.json".to_string())
        );
        assert_eq!(
            DataSource::from("data/clinics.json"),
            DataSource::File(PathBuf::from("data/clinics.json"))
        );
    }

    #[tokio::test]
    async fn missing_file_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StoragePaths::new(dir.path());
        let source = DataSource::File(dir.path().join("nope.json"));
        assert!(ensure_source(&paths, &source, false).await.is_err());
    }

    async fn serve_once(content_type: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("address should exist");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept should succeed");
            let mut buffer = [0_u8; 1024];
            let _ = socket.read(&mut buffer).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("response should write");
        });

        format!("http://{addr}/clinics_geocoded.json")
    }

    fn url_fetch(url: String, dir: &Path) -> SourceFetch {
        SourceFetch {
            source: DataSource::Url(url),
            paths: StoragePaths::new(dir),
            force_download: false,
        }
    }

    #[tokio::test]
    async fn url_source_is_downloaded_into_data_dir() {
        let url = serve_once("application/json", r#"[{"clinic":"A","lat":32.0,"lng":34.7}]"#).await;
        let dir = tempfile::tempdir().unwrap();
        let fetch = url_fetch(url, dir.path());

        let text = fetch.fetch().await.expect("download should succeed");

        assert!(text.contains("\"clinic\":\"A\""));
        assert!(file_present_nonempty(&fetch.paths.source_file()));
        assert!(!tmp_path(&fetch.paths.source_file()).exists());
    }

    #[tokio::test]
    async fn empty_download_is_rejected() {
        let url = serve_once("application/json", "").await;
        let dir = tempfile::tempdir().unwrap();
        let fetch = url_fetch(url, dir.path());

        assert!(fetch.fetch().await.is_err());
        assert!(!fetch.paths.source_file().exists());
        assert!(!tmp_path(&fetch.paths.source_file()).exists());
    }

    #[tokio::test]
    async fn html_page_is_not_saved_as_dataset() {
        let url = serve_once("text/html; charset=utf-8", "<html>login</html>").await;
        let dir = tempfile::tempdir().unwrap();
        let fetch = url_fetch(url, dir.path());

        let err = fetch.fetch().await.unwrap_err();
        assert!(format!("{err:#}").contains("HTML"));
        assert!(!fetch.paths.source_file().exists());
    }
}
