//! Submission configuration
//!
//! TOML file describing where waivers are stored, how the member's identity
//! is obtained and where consent is posted. Secrets can be left out of the
//! file and supplied through the environment instead:
//!
//! | Variable               | Overrides                        |
//! |------------------------|----------------------------------|
//! | `WAIVER_ENDPOINT_URL`  | `endpoint.url`                   |
//! | `WAIVER_ID_TOKEN`      | `identity.id_token` (static)     |
//! | `WAIVER_REFRESH_TOKEN` | `identity.refresh_token`         |
//! | `WAIVER_STORE_TOKEN`   | `store.auth_token` (http)        |

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::HttpConsentEndpoint;
use crate::identity::{IdentityProvider, Principal, RefreshTokenIdentity, StaticIdentity};
use crate::session::{ConsentSubmitter, SUCCESS_ROUTE};
use crate::store::{BlobStore, FsBlobStore, HttpBlobStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    pub endpoint: EndpointConfig,
    pub store: StoreConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Consent endpoint URL
    #[serde(default)]
    pub url: String,
    /// Per-request timeout in seconds for every HTTP call (token, storage,
    /// endpoint). Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Route returned after a successful submission
    #[serde(default = "default_success_route")]
    pub success_route: String,
}

fn default_success_route() -> String {
    SUCCESS_ROUTE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Http {
        /// Bucket root of the object-store REST API
        base_url: String,
        #[serde(default)]
        auth_token: Option<String>,
    },
    Fs {
        root: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityConfig {
    Static {
        uid: String,
        #[serde(default)]
        id_token: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        is_admin: bool,
    },
    RefreshToken {
        uid: String,
        token_url: String,
        #[serde(default)]
        refresh_token: String,
    },
}

impl SubmitConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Apply `WAIVER_*` environment variables on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("WAIVER_ENDPOINT_URL") {
            self.endpoint.url = url;
        }

        match &mut self.identity {
            IdentityConfig::Static { id_token, .. } => {
                if let Some(token) = lookup("WAIVER_ID_TOKEN") {
                    *id_token = token;
                }
            }
            IdentityConfig::RefreshToken { refresh_token, .. } => {
                if let Some(token) = lookup("WAIVER_REFRESH_TOKEN") {
                    *refresh_token = token;
                }
            }
        }

        if let StoreConfig::Http { auth_token, .. } = &mut self.store {
            if let Some(token) = lookup("WAIVER_STORE_TOKEN") {
                *auth_token = Some(token);
            }
        }
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.endpoint.timeout_secs.map(Duration::from_secs)
    }

    /// Check that every value needed to submit is present.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.endpoint.url.trim().is_empty() {
            anyhow::bail!("endpoint.url is not set (or WAIVER_ENDPOINT_URL)");
        }
        match &self.identity {
            IdentityConfig::Static { id_token, .. } if id_token.is_empty() => {
                anyhow::bail!("identity.id_token is not set (or WAIVER_ID_TOKEN)")
            }
            IdentityConfig::RefreshToken { refresh_token, .. } if refresh_token.is_empty() => {
                anyhow::bail!("identity.refresh_token is not set (or WAIVER_REFRESH_TOKEN)")
            }
            _ => Ok(()),
        }
    }
}

impl ConsentSubmitter {
    /// Wire up the HTTP or filesystem collaborators described by `config`.
    pub fn from_config(config: &SubmitConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        let identity: Arc<dyn IdentityProvider> = match &config.identity {
            IdentityConfig::Static {
                uid,
                id_token,
                email,
                is_admin,
            } => {
                let principal = Principal {
                    uid: uid.clone(),
                    email: email.clone(),
                    is_admin: *is_admin,
                };
                Arc::new(StaticIdentity::new(principal, id_token.clone()))
            }
            IdentityConfig::RefreshToken {
                uid,
                token_url,
                refresh_token,
            } => Arc::new(RefreshTokenIdentity::new(
                client.clone(),
                token_url.clone(),
                refresh_token.clone(),
                Principal::new(uid.clone()),
            )),
        };

        let store: Arc<dyn BlobStore> = match &config.store {
            StoreConfig::Http {
                base_url,
                auth_token,
            } => Arc::new(HttpBlobStore::new(
                client.clone(),
                base_url.clone(),
                auth_token.clone(),
            )),
            StoreConfig::Fs { root } => Arc::new(FsBlobStore::new(root.clone())),
        };

        let endpoint = HttpConsentEndpoint::new(client, config.endpoint.url.clone());

        Ok(ConsentSubmitter::new(identity, store, Arc::new(endpoint))
            .with_success_route(config.endpoint.success_route.clone()))
    }
}
