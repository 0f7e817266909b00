//! Dev-mode identity provider.
//!
//! Accepts `user:<email>` bearer tokens without any signature check. Only
//! wired up when `MDM_DEV` is set.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::identity::{IdentityProvider, VerifiedIdentity, VerifyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct DevIdentityProvider;

/// Stable, non-secret subject id for an email.
pub fn dev_subject_id(email: &str) -> String {
    let digest = Sha256::digest(email.as_bytes());
    let hex = format!("{:x}", digest);
    let short = hex.get(..32).unwrap_or(&hex);
    format!("usr_{short}")
}

#[async_trait]
impl IdentityProvider for DevIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let Some(email) = token.strip_prefix("user:") else {
            return Err(VerifyError::Invalid(
                "dev token must be in the form 'user:<email>'".to_string(),
            ));
        };

        let email = email.trim();
        if email.is_empty() || email.len() > 320 || !email.contains('@') {
            return Err(VerifyError::Invalid(
                "dev token must be in the form 'user:<email>'".to_string(),
            ));
        }

        Ok(VerifiedIdentity {
            subject_id: dev_subject_id(email),
            email: email.to_string(),
            name: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_token_maps_to_hashed_subject() {
        let identity = DevIdentityProvider
            .verify_token("user:staff@weedme.ca")
            .await
            .unwrap();

        assert_eq!(identity.email, "staff@weedme.ca");
        assert!(identity.subject_id.starts_with("usr_"));
        assert_eq!(identity.subject_id.len(), "usr_".len() + 32);
        assert_eq!(identity.subject_id, dev_subject_id("staff@weedme.ca"));
    }

    #[tokio::test]
    async fn test_other_tokens_are_invalid() {
        for token in ["opaque", "user:", "user:no-at-sign", "sp:svc"] {
            let err = DevIdentityProvider.verify_token(token).await.unwrap_err();
            assert!(matches!(err, VerifyError::Invalid(_)), "{token}");
        }
    }
}
