//! Bearer tokens and project discovery.
//!
//! Credentials are an explicit value handed to every request instead of being looked up
//! implicitly. [`AdcCredentials`] resolves them from Google Application Default
//! Credentials (service account file, `gcloud` user login, or the metadata server);
//! [`StaticCredentials`] wraps a token the caller already holds.

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use snafu::{ResultExt, Snafu};
use std::{fmt, sync::Arc};
use tracing::debug;

use crate::ErrorKind;

/// OAuth scope required by the Vertex AI prediction endpoints.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("no application default credentials found"))]
    Discover { source: gcp_auth::Error },

    #[snafu(display("failed to obtain an access token"))]
    Token { source: gcp_auth::Error },

    #[snafu(display("failed to determine the project id; pass one explicitly"))]
    Project { source: gcp_auth::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Credentials
    }
}

/// A bearer token together with the project it acts on.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    project_id: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            project_id: project_id.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Supplies fresh [`Credentials`] before authenticated calls.
///
/// Token lifetime and caching are the provider's business; callers simply ask again
/// whenever they need a token.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials, Error>;
}

/// Credentials resolved from Google Application Default Credentials.
pub struct AdcCredentials {
    provider: Arc<dyn TokenProvider>,
    project_id: Option<String>,
}

impl AdcCredentials {
    /// Discover the ambient credentials. An explicit `project_id` wins over the one the
    /// environment reports.
    pub async fn discover(project_id: Option<String>) -> Result<Self, Error> {
        let provider = gcp_auth::provider().await.context(DiscoverSnafu)?;
        Ok(Self {
            provider,
            project_id,
        })
    }
}

#[async_trait]
impl CredentialProvider for AdcCredentials {
    async fn credentials(&self) -> Result<Credentials, Error> {
        let token = self
            .provider
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .context(TokenSnafu)?;

        let project_id = match &self.project_id {
            Some(project_id) => project_id.clone(),
            None => self
                .provider
                .project_id()
                .await
                .context(ProjectSnafu)?
                .to_string(),
        };

        debug!(project = %project_id, "obtained access token");
        Ok(Credentials::new(token.as_str(), project_id))
    }
}

/// A fixed token and project, e.g. from `gcloud auth print-access-token`.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    pub fn new(token: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self(Credentials::new(token, project_id))
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Result<Credentials, Error> {
        Ok(self.0.clone())
    }
}
