//! GitHub release asset listing

use crate::error::{SetupError, SetupResult};
use crate::tools::ReleaseAssets;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Suffixes and markers of supply-chain attestation documents
const ATTESTATION_SUFFIXES: &[&str] = &[".intoto.jsonl", ".sigstore", ".sigstore.json"];
const ATTESTATION_MARKERS: &[&str] = &["provenance", "attestation"];

/// Whether a release asset name looks like an attestation document
pub fn is_attestation_asset(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    ATTESTATION_SUFFIXES.iter().any(|s| name.ends_with(s))
        || ATTESTATION_MARKERS.iter().any(|m| name.contains(m))
}

/// Extract `owner/repo` from a GitHub URL
fn github_slug(repo_url: &str) -> Option<String> {
    let rest = repo_url
        .trim_end_matches('/')
        .strip_prefix("https://github.com/")
        .or_else(|| repo_url.strip_prefix("git@github.com:"))?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Some(format!("{}/{}", owner, repo))
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<Asset>,
}

/// Lists release assets through the GitHub REST API
#[derive(Debug, Clone, Default)]
pub struct GithubReleases {
    token: Option<String>,
}

impl GithubReleases {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    fn fetch(&self, url: &str) -> SetupResult<Vec<String>> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();

        let mut request = agent
            .get(url)
            .header("User-Agent", concat!("leo-setup/", env!("CARGO_PKG_VERSION")))
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let http_err = |reason: String| SetupError::Http {
            url: url.to_string(),
            reason,
        };

        let mut response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(404)) => {
                debug!("No release at {}", url);
                return Ok(Vec::new());
            }
            Err(e) => return Err(http_err(e.to_string())),
        };

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| http_err(e.to_string()))?;
        let release: Release = serde_json::from_str(&body)?;
        Ok(release.assets.into_iter().map(|a| a.name).collect())
    }
}

#[async_trait]
impl ReleaseAssets for GithubReleases {
    async fn asset_names(&self, repo_url: &str, tag: &str) -> SetupResult<Vec<String>> {
        let Some(slug) = github_slug(repo_url) else {
            debug!("{} is not a GitHub repository; no release assets", repo_url);
            return Ok(Vec::new());
        };

        let url = format!("{}/repos/{}/releases/tags/{}", API_BASE, slug, tag);
        debug!("Fetching release assets: {}", url);

        let this = self.clone();
        tokio::task::spawn_blocking(move || this.fetch(&url))
            .await
            .map_err(|e| SetupError::User(format!("release lookup task failed: {}", e)))?
    }
}
