use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactPaths;
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Deserialize)]
pub struct GiphySearchResponse {
    #[serde(default)]
    pub data: Vec<GiphyGif>,
}

#[derive(Debug, Deserialize)]
pub struct GiphyGif {
    pub images: GiphyImages,
}

#[derive(Debug, Deserialize)]
pub struct GiphyImages {
    pub original: GiphyRendition,
}

#[derive(Debug, Deserialize)]
pub struct GiphyRendition {
    pub url: Option<String>,
}

/// Somewhere clips can be searched for and downloaded from.
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// URL of the best match for `keyword`, `None` when nothing matched.
    async fn search(&self, keyword: &str) -> PipelineResult<Option<String>>;

    /// Fetch `url` into `dest`.
    async fn download(&self, url: &str, dest: &Path) -> PipelineResult<PathBuf>;
}

pub struct GiphyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GiphyClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ClipSource for GiphyClient {
    async fn search(&self, keyword: &str) -> PipelineResult<Option<String>> {
        let url = format!("{}/v1/gifs/search", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[("q", keyword), ("api_key", self.api_key.as_str()), ("limit", "1")])
            .send()
            .await?;

        let status = res.status();
        debug!("Searching GIF for keyword: {}, status: {}", keyword, status);
        if !status.is_success() {
            return Err(PipelineError::upstream(format!(
                "GIF search for '{}' returned {}",
                keyword, status
            )));
        }

        let parsed: GiphySearchResponse = res.json().await?;
        Ok(parsed
            .data
            .into_iter()
            .next()
            .and_then(|gif| gif.images.original.url)
            .filter(|u| !u.is_empty()))
    }

    async fn download(&self, url: &str, dest: &Path) -> PipelineResult<PathBuf> {
        let mut res = self.http.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(dest).await?;
        let copied = async {
            while let Some(chunk) = res.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<(), PipelineError>(())
        }
        .await;

        if let Err(e) = copied {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(e);
        }
        Ok(dest.to_path_buf())
    }
}

/// One search per keyword; keywords without a usable result are skipped.
pub async fn search_clips(source: &dyn ClipSource, keywords: &[String]) -> Vec<String> {
    info!("Keywords for GIF search: {:?}", keywords);
    let mut urls = Vec::new();
    for keyword in keywords {
        match source.search(keyword).await {
            Ok(Some(url)) => {
                info!("Found GIF URL for '{}': {}", keyword, url);
                urls.push(url);
            }
            Ok(None) => info!("No GIF found for keyword: {}", keyword),
            Err(e) => warn!("Failed to search GIF for keyword {}: {}", keyword, e),
        }
    }
    urls
}

/// Download each URL to its request-scoped path. Failures are skipped, so the
/// result can be shorter than `urls`.
pub async fn download_clips(
    source: &dyn ClipSource,
    urls: &[String],
    paths: &ArtifactPaths,
) -> Vec<PathBuf> {
    let mut local = Vec::new();
    for (i, url) in urls.iter().enumerate() {
        let dest = paths.clip(i);
        match source.download(url, &dest).await {
            Ok(path) => {
                info!("Downloaded GIF saved at: {}", path.display());
                local.push(path);
            }
            Err(e) => warn!("Failed to download GIF from {}: {}", url, e),
        }
    }
    local
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::RequestId;
    use crate::config::AppConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GiphyClient {
        GiphyClient::new(reqwest::Client::new(), server.uri(), "test-key")
    }

    fn hit(url: &str) -> serde_json::Value {
        serde_json::json!({
            "data": [{ "images": { "original": { "url": url } } }],
            "meta": { "status": 200 }
        })
    }

    #[tokio::test]
    async fn search_returns_first_original_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/gifs/search"))
            .and(query_param("q", "water"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hit("https://media.example/water.gif")))
            .expect(1)
            .mount(&server)
            .await;

        let url = client(&server).search("water").await.unwrap();
        assert_eq!(url.as_deref(), Some("https://media.example/water.gif"));
    }

    #[tokio::test]
    async fn failed_and_empty_searches_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/gifs/search"))
            .and(query_param("q", "alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hit("https://m/alpha.gif")))
            .mount(&server)
            .await;
        Mock::given(path("/v1/gifs/search"))
            .and(query_param("q", "bravo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
            .mount(&server)
            .await;
        Mock::given(path("/v1/gifs/search"))
            .and(query_param("q", "charlie"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(path("/v1/gifs/search"))
            .and(query_param("q", "delta"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(path("/v1/gifs/search"))
            .and(query_param("q", "echo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hit("https://m/echo.gif")))
            .mount(&server)
            .await;

        let keywords: Vec<String> = ["alpha", "bravo", "charlie", "delta", "echo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let urls = search_clips(&client(&server), &keywords).await;
        assert_eq!(urls, vec!["https://m/alpha.gif", "https://m/echo.gif"]);
    }

    #[tokio::test]
    async fn empty_keyword_list_issues_no_requests() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/gifs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hit("https://m/x.gif")))
            .expect(0)
            .mount(&server)
            .await;

        let urls = search_clips(&client(&server), &[]).await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn downloads_are_independent() {
        let server = MockServer::start().await;
        Mock::given(path("/a.gif"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GIF89a-a".to_vec()))
            .mount(&server)
            .await;
        Mock::given(path("/b.gif"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/c.gif"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GIF89a-c".to_vec()))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::default().with_output_dir(tmp.path());
        config.ensure_dirs().unwrap();
        let paths = ArtifactPaths::new(&config, RequestId::from("feedbeef"));

        let urls: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|n| format!("{}/{}.gif", server.uri(), n))
            .collect();
        let local = download_clips(&client(&server), &urls, &paths).await;

        assert_eq!(local, vec![paths.clip(0), paths.clip(2)]);
        assert_eq!(std::fs::read(paths.clip(2)).unwrap(), b"GIF89a-c");
        assert!(!paths.clip(1).exists());
    }
}
