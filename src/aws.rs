//! AWS SDK configuration and credential resolution.
//!
//! The resolved credentials are shared by three consumers: the query service
//! client, the object storage client, and the embedded engine's S3 secret.

use std::fmt;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;

use crate::config::AwsConfig;
use crate::error::{AthenaError, Result};

/// Resolved AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .field("region", &self.region)
            .finish()
    }
}

/// Loads the SDK configuration, overriding region, static keys and endpoint
/// from `config` when they are set.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key.clone(),
            secret.clone(),
            config.session_token.clone(),
            None,
            "athena-cursor-config",
        ));
    }

    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint.clone());
    }

    loader.load().await
}

/// Resolves the credentials of a loaded SDK configuration.
///
/// Returns `None` when no provider is configured.
pub async fn resolve_credentials(sdk: &SdkConfig) -> Result<Option<AwsCredentials>> {
    let Some(provider) = sdk.credentials_provider() else {
        return Ok(None);
    };

    let credentials = provider
        .provide_credentials()
        .await
        .map_err(|e| AthenaError::config(format!("Failed to resolve AWS credentials: {e}")))?;

    Ok(Some(AwsCredentials {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().map(String::from),
        region: sdk.region().map(|r| r.to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = AwsCredentials {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "super-secret".to_string(),
            session_token: Some("token".to_string()),
            region: Some("us-east-1".to_string()),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("token\""));
    }

    #[tokio::test]
    async fn test_static_credentials_are_resolved() {
        let config = AwsConfig {
            region: Some("sa-east-1".to_string()),
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            session_token: None,
            endpoint_url: None,
        };
        let sdk = load_sdk_config(&config).await;
        let creds = resolve_credentials(&sdk).await.unwrap().unwrap();

        assert_eq!(creds.access_key_id, "AKIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "secret");
        assert_eq!(creds.region.as_deref(), Some("sa-east-1"));
    }
}
