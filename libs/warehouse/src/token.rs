//! OAuth access tokens for the warehouse REST API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::WarehouseError;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the metadata server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where access tokens come from.
#[derive(Clone)]
pub enum TokenSource {
    /// A fixed token supplied by configuration.
    Static(String),
    /// The GCE metadata server, cached until shortly before expiry.
    Metadata(Arc<RwLock<Option<CachedToken>>>),
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

impl TokenSource {
    pub fn from_config(access_token: Option<&str>) -> Self {
        match access_token {
            Some(token) => TokenSource::Static(token.to_string()),
            None => TokenSource::Metadata(Arc::new(RwLock::new(None))),
        }
    }

    /// Return a usable access token, refreshing it if required.
    pub async fn token(&self, http: &reqwest::Client) -> Result<String, WarehouseError> {
        let cache = match self {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata(cache) => cache,
        };

        {
            let cached = cache.read().await;
            if let Some(cached) = cached.as_ref() {
                if Instant::now() < cached.refresh_at {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut cached = cache.write().await;
        if let Some(current) = cached.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
        }

        let response = http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| WarehouseError::Credentials(format!("metadata server unreachable: {e}")))?
            .error_for_status()
            .map_err(|e| WarehouseError::Credentials(format!("metadata server rejected request: {e}")))?
            .json::<MetadataTokenResponse>()
            .await
            .map_err(|e| WarehouseError::Credentials(format!("invalid metadata token response: {e}")))?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!(expires_in = response.expires_in, "Refreshed warehouse access token");

        let token = response.access_token;
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_is_returned_verbatim() {
        let source = TokenSource::from_config(Some("ya29.test"));
        let token = source.token(&reqwest::Client::new()).await.unwrap();
        assert_eq!(token, "ya29.test");
    }

    #[test]
    fn test_missing_token_uses_metadata_server() {
        assert!(matches!(
            TokenSource::from_config(None),
            TokenSource::Metadata(_)
        ));
    }
}
