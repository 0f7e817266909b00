use std::net::SocketAddr;

use anyhow::{bail, Result};
use mdm_warehouse::WarehouseConfig;

use crate::auth::firebase::{FirebaseConfig, DEFAULT_JWKS_URL};

pub const DEFAULT_INTERNAL_DOMAIN: &str = "weedme.ca";
const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:3000,https://localhost:3000,http://127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    /// Accept `user:<email>` bearer tokens instead of Firebase ID tokens.
    pub dev_mode: bool,
    pub cors_origins: Vec<String>,
    pub warehouse: WarehouseConfig,
    /// `None` in dev mode.
    pub firebase: Option<FirebaseConfig>,
    pub internal_domain: String,
    pub admin_emails: Vec<String>,
}

/// Split a comma-separated list, dropping blank entries.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the CORS origin list. Credentials are allowed, so a wildcard origin
/// is rejected.
fn parse_cors_origins(value: &str) -> Result<Vec<String>> {
    let origins = parse_list(value);
    if origins.iter().any(|o| o == "*") {
        bail!("MDM_CORS_ORIGINS must list explicit origins; \"*\" is not allowed with credentials");
    }
    Ok(origins)
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("MDM_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
            .parse()?;

        let log_level = std::env::var("MDM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("MDM_DEV")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let cors_origins = parse_cors_origins(
            &std::env::var("MDM_CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
        )?;

        let warehouse = WarehouseConfig::from_env();
        if warehouse.project_id.trim().is_empty() {
            bail!("GCP_PROJECT_ID must be set");
        }
        if warehouse.dataset_id.trim().is_empty() {
            bail!("BIGQUERY_DATASET must be set");
        }

        let firebase = if dev_mode {
            None
        } else {
            let project_id = std::env::var("FIREBASE_PROJECT_ID").unwrap_or_default();
            if project_id.trim().is_empty() {
                bail!("FIREBASE_PROJECT_ID must be set unless MDM_DEV is enabled");
            }
            let mut firebase = FirebaseConfig::new(project_id.trim());
            firebase.jwks_url =
                std::env::var("FIREBASE_JWKS_URL").unwrap_or_else(|_| DEFAULT_JWKS_URL.to_string());
            Some(firebase)
        };

        let internal_domain = std::env::var("MDM_INTERNAL_DOMAIN")
            .unwrap_or_else(|_| DEFAULT_INTERNAL_DOMAIN.to_string());

        let admin_emails = parse_list(&std::env::var("MDM_ADMIN_EMAILS").unwrap_or_default());

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            cors_origins,
            warehouse,
            firebase,
            internal_domain,
            admin_emails,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list(" a@weedme.ca, ,b@weedme.ca,"),
            vec!["a@weedme.ca".to_string(), "b@weedme.ca".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_default_cors_origins() {
        assert_eq!(parse_cors_origins(DEFAULT_CORS_ORIGINS).unwrap().len(), 3);
    }

    #[test]
    fn test_wildcard_cors_origin_rejected() {
        assert!(parse_cors_origins("*").is_err());
        assert!(parse_cors_origins("http://localhost:3000, *").is_err());
        assert_eq!(
            parse_cors_origins("https://mdm.weedme.ca").unwrap(),
            vec!["https://mdm.weedme.ca".to_string()]
        );
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("yes"));
    }
}
