use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{Owner, Repository, RepositorySource};
use crate::error::{SyncError, SyncResult};

pub const GITHUB_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// Lists repositories through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubApiSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubApiSource {
    pub fn new(token: Option<String>) -> SyncResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("pull-all/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: GITHUB_API_URL.to_string(),
            token,
        })
    }

    /// Point at a GitHub Enterprise or test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self, owner: &Owner) -> String {
        format!("{}/{}", self.base_url, owner.api_path())
    }
}

/// Map a non-success listing response to an error.
fn check_status(status: StatusCode, owner: &Owner, url: &str) -> SyncResult<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(SyncError::NotFound {
            kind: owner.kind(),
            owner: owner.name().to_string(),
            url: url.to_string(),
        }),
        StatusCode::UNAUTHORIZED => Err(SyncError::Unauthorized {
            url: url.to_string(),
        }),
        other => Err(SyncError::Api {
            status: other.as_u16(),
            url: url.to_string(),
        }),
    }
}

#[async_trait]
impl RepositorySource for GitHubApiSource {
    async fn list(&self, owner: &Owner) -> SyncResult<Vec<Repository>> {
        let url = self.endpoint(owner);
        let mut repos = Vec::new();
        let mut page = 1usize;

        loop {
            debug!(url = %url, page, "fetching repository page");
            let mut request = self
                .client
                .get(&url)
                .header("Accept", "application/vnd.github+json")
                .query(&[("type", "all")])
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            check_status(response.status(), owner, &url)?;

            let batch: Vec<Repository> = response.json().await?;
            let fetched = batch.len();
            repos.extend(batch);
            if fetched < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(repos)
    }
}
