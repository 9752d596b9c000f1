//! Repository listing for a GitHub organization or user.
//!
//! The `gh` CLI is tried first since it reuses the user's existing login;
//! the REST API is the fallback.

mod api;
mod gh_cli;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SyncResult;
use crate::parallel::SyncItem;
use crate::timeout::TimeoutConfig;

pub use api::{GitHubApiSource, GITHUB_API_URL};
pub use gh_cli::{gh_auth_token, parse_gh_output, GhCliSource};

/// A repository as listed by GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub clone_url: String,
    #[serde(default)]
    pub ssh_url: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
}

impl Repository {
    /// URL to clone from, preferring SSH when requested and known.
    pub fn clone_url_for(&self, use_ssh: bool) -> &str {
        if use_ssh && !self.ssh_url.is_empty() {
            &self.ssh_url
        } else {
            &self.clone_url
        }
    }
}

impl SyncItem for Repository {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Whose repositories to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Organization(String),
    User(String),
}

impl Owner {
    pub fn name(&self) -> &str {
        match self {
            Owner::Organization(name) | Owner::User(name) => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Owner::Organization(_) => "Organization",
            Owner::User(_) => "User",
        }
    }

    /// REST path listing this owner's repositories.
    pub fn api_path(&self) -> String {
        match self {
            Owner::Organization(org) => format!("orgs/{}/repos", org),
            Owner::User(user) => format!("users/{}/repos", user),
        }
    }
}

/// Something that can list an owner's repositories.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn list(&self, owner: &Owner) -> SyncResult<Vec<Repository>>;
}

/// List `owner`'s repositories sorted by name, via `gh` or the REST API.
pub async fn fetch_repositories(
    owner: &Owner,
    token: Option<&str>,
    timeouts: &TimeoutConfig,
) -> SyncResult<Vec<Repository>> {
    let gh = GhCliSource::new(timeouts.listing_timeout);
    let mut repos = match gh.list(owner).await {
        Ok(repos) => repos,
        Err(err) => {
            warn!("{}; falling back to the GitHub API", err);
            GitHubApiSource::new(token.map(str::to_string))?
                .list(owner)
                .await?
        }
    };
    repos.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(ssh_url: &str) -> Repository {
        Repository {
            name: "alpha".to_string(),
            clone_url: "https://github.com/acme/alpha.git".to_string(),
            ssh_url: ssh_url.to_string(),
            html_url: "https://github.com/acme/alpha".to_string(),
            private: false,
            fork: false,
        }
    }

    #[test]
    fn test_clone_url_prefers_ssh_when_requested() {
        let with_ssh = repo("git@github.com:acme/alpha.git");
        assert_eq!(with_ssh.clone_url_for(true), "git@github.com:acme/alpha.git");
        assert_eq!(with_ssh.clone_url_for(false), "https://github.com/acme/alpha.git");
    }

    #[test]
    fn test_clone_url_falls_back_to_https_without_ssh_url() {
        assert_eq!(repo("").clone_url_for(true), "https://github.com/acme/alpha.git");
    }

    #[test]
    fn test_owner_paths() {
        let org = Owner::Organization("acme".to_string());
        assert_eq!(org.api_path(), "orgs/acme/repos");
        assert_eq!(org.kind(), "Organization");

        let user = Owner::User("octocat".to_string());
        assert_eq!(user.api_path(), "users/octocat/repos");
        assert_eq!(user.name(), "octocat");
    }

    #[test]
    fn test_api_payload_deserializes() {
        let payload = r#"[{
            "name": "alpha",
            "clone_url": "https://github.com/acme/alpha.git",
            "ssh_url": "git@github.com:acme/alpha.git",
            "html_url": "https://github.com/acme/alpha",
            "private": true,
            "fork": false,
            "stargazers_count": 3
        }]"#;
        let repos: Vec<Repository> = serde_json::from_str(payload).unwrap();
        assert_eq!(repos.len(), 1);
        assert!(repos[0].private);
        assert_eq!(SyncItem::name(&repos[0]), "alpha");
    }
}
