//! Workspace secret lookup
//!
//! Private keys live in the hosting platform's per-workspace secret store.
//! Secret listings only ever carry names; values are fetched for the single
//! matching secret and held as `SecretString` from then on.

use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Header carrying the platform API key
pub const API_KEY_HEADER: &str = "x-openserv-key";

/// A secret as listed by the store (no value)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretEntry {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
}

fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "secret id must be a string or number, got {}",
            other
        ))),
    }
}

/// Workspace-scoped secret storage
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn list_secrets(&self, workspace_id: &str) -> Result<Vec<SecretEntry>>;

    async fn secret_value(&self, workspace_id: &str, secret_id: &str) -> Result<SecretString>;
}

/// OpenServ agent-secrets API
pub struct OpenServSecretStore {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenServSecretStore {
    pub fn new(client: Client, base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not set; cannot read workspace secrets",
                    crate::config::OPENSERV_API_KEY_ENV
                ))
            })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                service: "openserv",
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SecretStore for OpenServSecretStore {
    async fn list_secrets(&self, workspace_id: &str) -> Result<Vec<SecretEntry>> {
        let response = self
            .get(&format!("/workspaces/{}/agent-secrets", workspace_id))
            .await?;
        Ok(response.json().await?)
    }

    async fn secret_value(&self, workspace_id: &str, secret_id: &str) -> Result<SecretString> {
        let response = self
            .get(&format!(
                "/workspaces/{}/agent-secrets/{}/value",
                workspace_id, secret_id
            ))
            .await?;
        let text = response.text().await?;
        Ok(SecretString::from(text))
    }
}

/// Remove one surrounding pair of JSON string quotes, if present
pub fn strip_quotes(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw.strip_prefix('"').unwrap_or(raw);
    raw.strip_suffix('"').unwrap_or(raw)
}

/// Shortest secret that gets a preview; shorter ones are fully redacted
const MIN_PREVIEW_LEN: usize = 32;

/// Bounded preview of key material: first 10 and last 4 characters.
/// Secrets under 32 characters are not previewed at all, so a preview never
/// shows more than 14 of at least 32 characters.
pub fn key_preview(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < MIN_PREVIEW_LEN {
        return "[redacted]".to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Fetches a named private key from a workspace
pub struct CredentialFetcher {
    store: Box<dyn SecretStore>,
}

impl CredentialFetcher {
    pub fn new(store: Box<dyn SecretStore>) -> Self {
        Self { store }
    }

    pub async fn fetch_private_key(
        &self,
        workspace_id: &str,
        secret_name: &str,
    ) -> Result<SecretString> {
        let secrets = self.store.list_secrets(workspace_id).await?;
        tracing::debug!(workspace = %workspace_id, count = secrets.len(), "Listed workspace secrets");

        let Some(entry) = secrets.iter().find(|s| s.name == secret_name) else {
            return Err(Error::SecretNotFound {
                name: secret_name.to_string(),
                available: secrets.into_iter().map(|s| s.name).collect(),
            });
        };

        let raw = self.store.secret_value(workspace_id, &entry.id).await?;
        let key = strip_quotes(raw.expose_secret());
        if key.is_empty() {
            return Err(Error::Config(format!("Secret \"{}\" is empty", secret_name)));
        }

        tracing::info!(
            secret = %secret_name,
            preview = %key_preview(key),
            "Private key retrieved"
        );
        Ok(SecretString::from(key.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MemorySecretStore;
    use super::*;
    use crate::test_http::TestServer;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"0xabc\""), "0xabc");
        assert_eq!(strip_quotes("0xabc"), "0xabc");
        assert_eq!(strip_quotes("\"0xabc"), "0xabc");
        assert_eq!(strip_quotes("\"\"0xabc\"\""), "\"0xabc\"");
    }

    #[test]
    fn test_key_preview_bounds() {
        let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        assert_eq!(key_preview(key), "0xac0974be...ff80");
        assert_eq!(key_preview("0123456789abcdef"), "[redacted]");
        assert_eq!(key_preview("0123456789abcdefg"), "[redacted]");
        assert_eq!(key_preview(&"a".repeat(31)), "[redacted]");
        assert_eq!(key_preview(&"a".repeat(32)), "aaaaaaaaaa...aaaa");
        assert!(!key_preview("short").contains("short"));
    }

    #[test]
    fn test_entry_accepts_numeric_id() {
        let entries: Vec<SecretEntry> =
            serde_json::from_str(r#"[{"id": 42, "name": "pk"}, {"id": "7", "name": "other"}]"#)
                .unwrap();
        assert_eq!(entries[0].id, "42");
        assert_eq!(entries[1].id, "7");
    }

    #[tokio::test]
    async fn test_fetch_strips_quotes() {
        let fetcher = CredentialFetcher::new(Box::new(MemorySecretStore::new(&[
            ("1", "other", "\"0x1\""),
            ("2", "trading_pk", "\"0xfeedface00000000000000000000\""),
        ])));

        let key = fetcher.fetch_private_key("ws", "trading_pk").await.unwrap();
        assert_eq!(key.expose_secret(), "0xfeedface00000000000000000000");
    }

    #[tokio::test]
    async fn test_missing_secret_lists_names_only() {
        let store = MemorySecretStore::new(&[
            ("1", "alpha", "0xsecretvalue1"),
            ("2", "beta", "0xsecretvalue2"),
        ]);
        let reads = store.value_reads.clone();
        let fetcher = CredentialFetcher::new(Box::new(store));

        let err = fetcher.fetch_private_key("ws", "gamma").await.unwrap_err();
        match &err {
            Error::SecretNotFound { name, available } => {
                assert_eq!(name, "gamma");
                assert_eq!(available, &vec!["alpha".to_string(), "beta".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.to_string().contains("secretvalue"));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_name_match_is_exact() {
        let fetcher =
            CredentialFetcher::new(Box::new(MemorySecretStore::new(&[("1", "PK", "0x1")])));
        assert!(fetcher.fetch_private_key("ws", "pk").await.is_err());
    }

    #[tokio::test]
    async fn test_openserv_round_trip() {
        let server = TestServer::spawn(&[
            (
                "/workspaces/ws9/agent-secrets",
                200,
                r#"[{"id": 4, "name": "other"}, {"id": 5, "name": "trading_pk"}]"#,
            ),
            ("/workspaces/ws9/agent-secrets/5/value", 200, "\"0xfeedface\""),
        ])
        .await;
        let store = OpenServSecretStore::new(
            Client::new(),
            &server.base_url,
            Some(SecretString::from("test-api-key".to_string())),
        );
        let fetcher = CredentialFetcher::new(Box::new(store));

        let key = fetcher.fetch_private_key("ws9", "trading_pk").await.unwrap();
        assert_eq!(key.expose_secret(), "0xfeedface");

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].target(), "/workspaces/ws9/agent-secrets");
        assert_eq!(requests[1].target(), "/workspaces/ws9/agent-secrets/5/value");
        for request in &requests {
            assert!(request.head.starts_with("GET "));
            assert_eq!(request.header(API_KEY_HEADER), Some("test-api-key"));
        }
    }

    #[tokio::test]
    async fn test_openserv_rejection_carries_status() {
        let server = TestServer::spawn(&[(
            "/workspaces/ws9/agent-secrets",
            403,
            r#"{"message":"forbidden"}"#,
        )])
        .await;
        let store = OpenServSecretStore::new(
            Client::new(),
            &server.base_url,
            Some(SecretString::from("test-api-key".to_string())),
        );

        let err = store.list_secrets("ws9").await.unwrap_err();
        match &err {
            Error::Upstream {
                service,
                status,
                message,
            } => {
                assert_eq!(*service, "openserv");
                assert_eq!(*status, 403);
                assert!(message.contains("forbidden"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.kind(), crate::error::ErrorKind::UpstreamError);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let store = OpenServSecretStore::new(Client::new(), "http://127.0.0.1:1", None);
        let err = store.list_secrets("ws").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigurationError);
    }
}
