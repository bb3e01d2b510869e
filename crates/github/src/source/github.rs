//! GitHub GraphQL metadata source.

use crate::error::{ErrorKind, Result};
use crate::manifest;
use crate::models::CanonicalCommit;
use crate::source::MetadataSource;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;

pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";
const MANIFEST_PATH: &str = "META-INF/books.xml";

// One round trip per commit: repository identity, commit metadata and the
// manifest blob all come back in the same response.
const QUERY: &str = r#"
query ($owner: String!, $name: String!, $commit: String!, $manifest: String!) {
  repository(owner: $owner, name: $name) {
    databaseId
    commit: object(expression: $commit) {
      ... on Commit {
        oid
        committedDate
      }
    }
    manifest: object(expression: $manifest) {
      ... on Blob {
        text
      }
    }
  }
}
"#;

/// Connection settings for [`GitHubSource`].
#[derive(Clone, Debug)]
pub struct GitHubOptions {
    pub endpoint: String,
    pub timeout: Duration,
    pub user_agent: String,
}
impl Default for GitHubOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("abl-migrate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct GraphQlData {
    repository: Option<RepositoryNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    database_id: Option<u64>,
    commit: Option<CommitNode>,
    manifest: Option<BlobNode>,
}

// Every field is optional: when the expression resolves to some other kind of
// git object, the inline fragment matches nothing and GitHub returns `{}`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitNode {
    oid: Option<String>,
    committed_date: Option<String>,
}

#[derive(Deserialize)]
struct BlobNode {
    text: Option<String>,
}

/// Metadata source backed by the GitHub GraphQL API.
pub struct GitHubSource {
    client: Client,
    endpoint: String,
    token: String,
}

impl GitHubSource {
    /// Create a source with default options, authenticating with `token`.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_options(token, GitHubOptions::default())
    }

    pub fn with_options(token: impl Into<String>, options: GitHubOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent)
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self {
            client,
            endpoint: options.endpoint,
            token: token.into(),
        })
    }

    async fn query(&self, name: &str, owner: &str, commit: &str) -> Result<RepositoryNode> {
        let body = json!({
            "query": QUERY,
            "variables": {
                "owner": owner,
                "name": name,
                "commit": commit,
                "manifest": format!("{commit}:{MANIFEST_PATH}"),
            },
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .or_raise(|| ErrorKind::Network)?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        let response: GraphQlResponse =
            response.json().await.or_raise(|| ErrorKind::InvalidResponse("malformed JSON body"))?;
        if !response.errors.is_empty() {
            let messages = response.errors.into_iter().map(|e| e.message).collect::<Vec<_>>();
            exn::bail!(ErrorKind::Api(messages.join("; ")));
        }
        response
            .data
            .ok_or_raise(|| ErrorKind::InvalidResponse("missing data"))?
            .repository
            .ok_or_raise(|| ErrorKind::RepositoryNotFound(format!("{owner}/{name}")))
    }
}

#[async_trait]
impl MetadataSource for GitHubSource {
    fn name(&self) -> &str {
        "github"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, name: &str, owner: &str, commit: &str) -> Result<CanonicalCommit> {
        let repository = self.query(name, owner, commit).await?;
        let repository_id = repository
            .database_id
            .ok_or_raise(|| ErrorKind::InvalidResponse("missing repository databaseId"))?;
        let node = repository.commit.ok_or_raise(|| ErrorKind::CommitNotFound(commit.to_string()))?;
        let (Some(hash), Some(committed_date)) = (node.oid, node.committed_date) else {
            exn::bail!(ErrorKind::CommitNotFound(commit.to_string()));
        };
        let timestamp = OffsetDateTime::parse(&committed_date, &Rfc3339)
            .or_raise(|| ErrorKind::InvalidResponse("commit date is not RFC 3339"))?
            .to_utc();
        let text = repository
            .manifest
            .and_then(|blob| blob.text)
            .ok_or_raise(|| ErrorKind::ManifestMissing(hash.clone()))?;
        let books = manifest::parse(&text)?;
        tracing::debug!(%hash, books = books.len(), "Fetched canonical commit");
        Ok(CanonicalCommit {
            repository_id,
            hash,
            timestamp,
            books,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_deserializes() {
        let body = r#"{
            "data": {
                "repository": {
                    "databaseId": 185300544,
                    "commit": { "oid": "4d6ee4f1a8c5e3bd1f0fa2fc0b2ba1f0a5b4d6c2", "committedDate": "2023-11-14T22:13:20Z" },
                    "manifest": { "text": "<container><book slug=\"biology-2e\" style=\"biology\" /></container>" }
                }
            }
        }"#;
        let response: GraphQlResponse = serde_json::from_str(body).unwrap();
        assert!(response.errors.is_empty());
        let repository = response.data.unwrap().repository.unwrap();
        assert_eq!(repository.database_id, Some(185300544));
        let commit = repository.commit.unwrap();
        let timestamp = OffsetDateTime::parse(&commit.committed_date.unwrap(), &Rfc3339).unwrap();
        assert_eq!(timestamp.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_non_commit_object_deserializes_as_empty() {
        let body = r#"{ "data": { "repository": { "databaseId": 1, "commit": {}, "manifest": null } } }"#;
        let response: GraphQlResponse = serde_json::from_str(body).unwrap();
        let repository = response.data.unwrap().repository.unwrap();
        let commit = repository.commit.unwrap();
        assert!(commit.oid.is_none());
        assert!(repository.manifest.is_none());
    }

    #[test]
    fn test_error_response_deserializes() {
        let body = r#"{ "data": null, "errors": [{ "message": "Could not resolve to a Repository", "type": "NOT_FOUND" }] }"#;
        let response: GraphQlResponse = serde_json::from_str(body).unwrap();
        assert!(response.data.is_none());
        assert_eq!(response.errors[0].message, "Could not resolve to a Repository");
    }

    #[test]
    fn test_client_builds_with_default_options() {
        assert!(GitHubSource::new("token").is_ok());
    }
}
