//! Graph API client

use super::{FriendSource, SourceError, SourceResult};
use crate::config::FriendGraphConfig;
use crate::model::{MutualFriendSet, User};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Error code the Graph API uses for invalid or expired access tokens
const INVALID_TOKEN_CODE: i64 = 190;

/// One page of a Graph API connection
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    code: i64,
}

impl ApiErrorBody {
    fn into_source_error(self, status: u16) -> SourceError {
        if self.code == INVALID_TOKEN_CODE || status == StatusCode::UNAUTHORIZED.as_u16() {
            SourceError::Authentication(self.message)
        } else {
            SourceError::Api {
                status,
                message: format!("{}: {} (code {})", self.kind, self.message, self.code),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MutualContext {
    #[serde(default)]
    context: Option<Context>,
}

#[derive(Debug, Deserialize)]
struct Context {
    #[serde(default)]
    mutual_friends: Option<Page<User>>,
}

/// HTTP client for the Graph API, bound to one access token
pub struct GraphApiClient {
    client: Client,
    api_base_url: String,
    version: String,
    access_token: String,
}

impl GraphApiClient {
    pub fn new(access_token: impl Into<String>, config: &FriendGraphConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base_url: config.graph_api_url.trim_end_matches('/').to_string(),
            version: config.api_version.clone(),
            access_token: access_token.into(),
        })
    }

    fn endpoint(&self, path: &str, fields: &str) -> SourceResult<Url> {
        let url = format!("{}/{}/{}", self.api_base_url, self.version, path);
        Url::parse_with_params(
            &url,
            &[("fields", fields), ("access_token", self.access_token.as_str())],
        )
        .map_err(|e| SourceError::InvalidUrl(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> SourceResult<T> {
        // The query string carries the token, so only the path is logged
        debug!("GET {}", url.path());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            return Err(envelope.error.into_source_error(status.as_u16()));
        }
        if !status.is_success() {
            return Err(SourceError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }

    /// Follow `paging.next` links until a page comes back empty or without a successor
    async fn collect_pages(&self, first: Page<User>) -> SourceResult<Vec<User>> {
        let mut users = first.data;
        let mut next = first.paging.and_then(|p| p.next);

        while let Some(link) = next {
            let url = Url::parse(&link).map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
            let page: Page<User> = self.get_json(url).await?;
            if page.data.is_empty() {
                break;
            }
            users.extend(page.data);
            next = page.paging.and_then(|p| p.next);
        }

        Ok(users)
    }
}

#[async_trait]
impl FriendSource for GraphApiClient {
    async fn owner_profile(&self) -> SourceResult<User> {
        self.get_json(self.endpoint("me", "id,name")?).await
    }

    async fn friends(&self, owner_id: &str) -> SourceResult<Vec<User>> {
        let first: Page<User> = self
            .get_json(self.endpoint(&format!("{}/friends", owner_id), "id,name")?)
            .await?;
        let friends = self.collect_pages(first).await?;
        debug!("Fetched {} friends of {}", friends.len(), owner_id);
        Ok(friends)
    }

    /// Mutual friends come from the friend's social context, which is always
    /// relative to the token owner, so `_owner_id` only documents intent.
    async fn mutual_friends(&self, _owner_id: &str, friend_id: &str) -> SourceResult<MutualFriendSet> {
        let response: MutualContext = self
            .get_json(self.endpoint(friend_id, "context.fields(mutual_friends)")?)
            .await?;

        let Some(first) = response.context.and_then(|c| c.mutual_friends) else {
            return Ok(MutualFriendSet::new());
        };
        let mutuals = self.collect_pages(first).await?;
        Ok(mutuals.into_iter().map(|u| u.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_params() {
        let config = FriendGraphConfig {
            graph_api_url: "https://graph.example.com/".to_string(),
            ..FriendGraphConfig::default()
        };
        let client = GraphApiClient::new("tok en&", &config).unwrap();
        let url = client.endpoint("me", "id,name").unwrap();

        assert_eq!(url.path(), "/v2.9/me");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("fields".to_string(), "id,name".to_string())));
        assert!(pairs.contains(&("access_token".to_string(), "tok en&".to_string())));
    }

    #[test]
    fn test_error_mapping() {
        let expired = ApiErrorBody {
            message: "Session has expired".to_string(),
            kind: "OAuthException".to_string(),
            code: 190,
        };
        assert!(expired.into_source_error(400).is_authentication());

        let limited = ApiErrorBody {
            message: "Application request limit reached".to_string(),
            kind: "OAuthException".to_string(),
            code: 4,
        };
        match limited.into_source_error(400) {
            SourceError::Api { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("code 4"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_page_without_paging() {
        let page: Page<User> = serde_json::from_str(r#"{"data":[{"id":"2","name":"Bob"}]}"#).unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(page.paging.is_none());
    }
}
