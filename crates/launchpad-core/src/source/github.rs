//! GitHub git-data API file source.

use super::{FileEntry, FileSource, RepoRef, SourceError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com/";

/// Environment variable holding an optional access token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}

/// Reads a repository through the trees and blobs endpoints.
#[derive(Debug, Clone)]
pub struct GithubSource {
    repo: RepoRef,
    base_url: Url,
    token: Option<String>,
    http: Client,
}

impl GithubSource {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be created.
    pub fn new(repo: RepoRef, base_url: &str, token: Option<String>) -> Result<Self, SourceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SourceError::Http(format!("Invalid API URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("launchpad/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            repo,
            base_url,
            token,
            http,
        })
    }

    /// Client for api.github.com using `GITHUB_TOKEN` when set.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_env(repo: RepoRef) -> Result<Self, SourceError> {
        let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        Self::new(repo, DEFAULT_API_BASE, token)
    }

    #[must_use]
    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    fn endpoint(&self, path: &str) -> Result<Url, SourceError> {
        self.base_url
            .join(path)
            .map_err(|e| SourceError::Http(format!("Failed to build URL for '{path}': {e}")))
    }

    async fn get(&self, url: Url, what: &str) -> Result<Response, SourceError> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        check_status(&response, what)?;
        Ok(response)
    }
}

/// Map GitHub's error statuses to distinguishable variants.
fn check_status(response: &Response, what: &str) -> Result<(), SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok());
    Err(classify_status(status, remaining, what))
}

fn classify_status(status: StatusCode, ratelimit_remaining: Option<&str>, what: &str) -> SourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited,
        StatusCode::FORBIDDEN if ratelimit_remaining == Some("0") => SourceError::RateLimited,
        StatusCode::NOT_FOUND => SourceError::NotFound(what.to_string()),
        other => SourceError::Http(format!("GitHub returned status {other} for {what}")),
    }
}

fn decode_base64(input: &str) -> Result<Vec<u8>, SourceError> {
    // GitHub wraps blob content at 60 columns.
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| SourceError::InvalidResponse(format!("invalid base64 blob: {e}")))
}

#[async_trait]
impl FileSource for GithubSource {
    async fn list(&self) -> Result<Vec<FileEntry>, SourceError> {
        let url = self.endpoint(&format!(
            "repos/{}/{}/git/trees/{}?recursive=1",
            self.repo.owner, self.repo.repo, self.repo.reference
        ))?;
        let what = self.repo.to_string();
        let body: TreeResponse = self
            .get(url, &what)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        if body.truncated {
            tracing::warn!(repo = %self.repo, "tree listing truncated by GitHub; some files are missing");
        }

        Ok(body
            .tree
            .into_iter()
            .filter(|item| item.kind == "blob")
            .map(|item| FileEntry {
                path: item.path,
                id: item.sha,
                size: item.size,
            })
            .collect())
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, SourceError> {
        let url = self.endpoint(&format!(
            "repos/{}/{}/git/blobs/{id}",
            self.repo.owner, self.repo.repo
        ))?;
        let body: BlobResponse = self
            .get(url, &format!("blob {id}"))
            .await?
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        match body.encoding.as_str() {
            "base64" => decode_base64(&body.content),
            "utf-8" | "utf8" => Ok(body.content.into_bytes()),
            other => Err(SourceError::InvalidResponse(format!(
                "unsupported blob encoding '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, Some("0"), "o/r"),
            SourceError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None, "o/r"),
            SourceError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None, "o/r"),
            SourceError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, Some("42"), "o/r"),
            SourceError::Http(_)
        ));
    }

    #[test]
    fn test_base64_blob_content() {
        assert_eq!(decode_base64("aGVsbG8=\n").unwrap(), b"hello");
        assert_eq!(decode_base64("e30K").unwrap(), b"{}\n");
        assert!(decode_base64("a$b").is_err());
    }

    #[test]
    fn test_client_creation() {
        assert!(GithubSource::new(RepoRef::new("o", "r"), DEFAULT_API_BASE, None).is_ok());
        assert!(GithubSource::new(RepoRef::new("o", "r"), "not-a-url", None).is_err());
    }

    #[test]
    fn test_tree_response_shape() {
        let body: TreeResponse = serde_json::from_str(
            r#"{ "sha": "x", "tree": [
                { "path": "src", "type": "tree", "sha": "t1" },
                { "path": "src/a.js", "type": "blob", "sha": "b1", "size": 12 }
            ], "truncated": false }"#,
        )
        .unwrap();
        assert_eq!(body.tree.len(), 2);
        assert_eq!(body.tree[1].size, 12);
    }
}
