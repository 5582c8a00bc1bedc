use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use snafu::{ResultExt, Snafu};
use std::{fmt, sync::Arc, time::Duration};
use tracing::instrument;
use url::Url;

use crate::{
    auth::Credentials,
    video::{FetchOperationRequest, GenerationBuilder, OperationHandle},
    ErrorKind,
};

/// Region used when the caller does not pick one.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Per-request timeout applied to every call against the Vertex AI API.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to build HTTP client"))]
    BuildHttpClient { source: reqwest::Error },

    #[snafu(display("failed to construct URL (probably incorrect location or model name): {suffix}"))]
    ConstructUrl {
        source: url::ParseError,
        suffix: String,
    },

    #[snafu(display("failed to perform request to '{url}'"))]
    PerformRequest { source: reqwest::Error, url: Url },

    #[snafu(display(
        "bad response from server; code {code}; description: {}",
        description.as_deref().unwrap_or("none")
    ))]
    BadResponse {
        /// HTTP status code
        code: u16,
        /// HTTP error description
        description: Option<String>,
    },

    #[snafu(display("failed to deserialize response from '{url}'"))]
    Decode { source: reqwest::Error, url: Url },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BuildHttpClient { .. } | Error::ConstructUrl { .. } => ErrorKind::Configuration,
            Error::PerformRequest { .. } | Error::BadResponse { .. } => ErrorKind::Transport,
            Error::Decode { .. } => ErrorKind::Protocol,
        }
    }
}

/// Veo models available on Vertex AI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Model {
    #[default]
    Veo3Preview,
    Veo3,
    Veo3Fast,
    Veo2,
    /// Any other publisher model id, passed through verbatim.
    Custom(String),
}

impl Model {
    pub fn as_str(&self) -> &str {
        match self {
            Model::Veo3Preview => "veo-3.0-generate-preview",
            Model::Veo3 => "veo-3.0-generate-001",
            Model::Veo3Fast => "veo-3.0-fast-generate-001",
            Model::Veo2 => "veo-2.0-generate-001",
            Model::Custom(id) => id,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Model {
    fn from(id: &str) -> Self {
        match id {
            "veo-3.0-generate-preview" => Model::Veo3Preview,
            "veo-3.0-generate-001" => Model::Veo3,
            "veo-3.0-fast-generate-001" => Model::Veo3Fast,
            "veo-2.0-generate-001" => Model::Veo2,
            other => Model::Custom(other.to_string()),
        }
    }
}

impl From<String> for Model {
    fn from(id: String) -> Self {
        Model::from(id.as_str())
    }
}

/// Internal client for making requests to the Vertex AI API
#[derive(Debug)]
pub(crate) struct VeoClient {
    http_client: Client,
    pub location: String,
    pub model: Model,
    base_url: Url,
}

impl VeoClient {
    fn new(location: String, model: Model, base_url: Url) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("veo-batch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(BuildHttpClientSnafu)?;

        Ok(Self {
            http_client,
            location,
            model,
            base_url,
        })
    }

    /// Start a long-running prediction against the configured model
    #[instrument(skip_all, fields(model = %self.model, project = %credentials.project_id()))]
    pub(crate) async fn predict_long_running<T: Serialize, R: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        request: &T,
    ) -> Result<R, Error> {
        let suffix = format!(
            "projects/{}/locations/{}/publishers/google/models/{}:predictLongRunning",
            credentials.project_id(),
            self.location,
            self.model
        );
        let url = self.build_url(&suffix)?;
        self.post_json(url, credentials, request).await
    }

    /// Fetch a fresh snapshot of a long-running operation
    #[instrument(skip_all, fields(operation.name = %name))]
    pub(crate) async fn fetch_predict_operation<R: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        name: &str,
    ) -> Result<R, Error> {
        let url = self.build_url(&format!("{name}:fetchPredictOperation"))?;
        let request = FetchOperationRequest {
            operation_name: name.to_string(),
        };
        self.post_json(url, credentials, &request).await
    }

    /// Post JSON to an endpoint with the caller's bearer token
    async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        url: Url,
        credentials: &Credentials,
        request: &T,
    ) -> Result<R, Error> {
        let response = self
            .http_client
            .post(url.clone())
            .bearer_auth(credentials.token())
            .json(request)
            .send()
            .await
            .context(PerformRequestSnafu { url: url.clone() })?;

        Self::check_response(response)
            .await?
            .json()
            .await
            .context(DecodeSnafu { url })
    }

    async fn check_response(response: Response) -> Result<Response, Error> {
        let status = response.status();
        if !status.is_success() {
            let description = response.text().await.ok();
            return BadResponseSnafu {
                code: status.as_u16(),
                description,
            }
            .fail();
        }
        Ok(response)
    }

    /// Build a URL relative to the API root
    fn build_url(&self, suffix: &str) -> Result<Url, Error> {
        let url_str = format!("{}{}", self.base_url, suffix.trim_start_matches('/'));
        Url::parse(&url_str).context(ConstructUrlSnafu {
            suffix: suffix.to_string(),
        })
    }
}

/// Client for Veo video generation on Vertex AI
#[derive(Clone, Debug)]
pub struct Veo {
    client: Arc<VeoClient>,
}

impl Veo {
    /// Create a new client for the given region using the default model
    pub fn new(location: impl Into<String>) -> Result<Self, Error> {
        Self::with_model(location, Model::default())
    }

    /// Create a new client for the given region and model
    pub fn with_model(location: impl Into<String>, model: impl Into<Model>) -> Result<Self, Error> {
        let location = location.into();
        let base_url = format!("https://{location}-aiplatform.googleapis.com/v1/");
        let base_url = Url::parse(&base_url).context(ConstructUrlSnafu { suffix: base_url })?;
        Self::with_model_and_base_url(location, model, base_url)
    }

    /// Create a new client with a custom API root, e.g. a regional proxy or a test server
    pub fn with_model_and_base_url(
        location: impl Into<String>,
        model: impl Into<Model>,
        mut base_url: Url,
    ) -> Result<Self, Error> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = VeoClient::new(location.into(), model.into(), base_url)?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub fn location(&self) -> &str {
        &self.client.location
    }

    pub fn model(&self) -> &Model {
        &self.client.model
    }

    /// Start building a video generation request
    pub fn generate_video(&self) -> GenerationBuilder {
        GenerationBuilder::new(self.client.clone())
    }

    /// Get a handle to an existing long-running operation by its name.
    pub fn operation(&self, name: impl Into<String>) -> OperationHandle {
        OperationHandle::new(self.client.clone(), name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_ids_round_trip_through_from() {
        for model in [Model::Veo3Preview, Model::Veo3, Model::Veo3Fast, Model::Veo2] {
            assert_eq!(Model::from(model.as_str()), model);
        }
        assert_eq!(
            Model::from("veo-9.9-experimental"),
            Model::Custom("veo-9.9-experimental".to_string())
        );
    }

    #[test]
    fn default_base_url_is_regional() {
        let veo = Veo::new("europe-west4").unwrap();
        let url = veo.client.build_url("projects/p/locations/europe-west4").unwrap();
        assert_eq!(
            url.as_str(),
            "https://europe-west4-aiplatform.googleapis.com/v1/projects/p/locations/europe-west4"
        );
    }

    #[test]
    fn custom_base_url_gains_trailing_slash() {
        let base = Url::parse("http://127.0.0.1:8080/v1").unwrap();
        let veo = Veo::with_model_and_base_url("us-central1", Model::Veo2, base).unwrap();
        let url = veo
            .client
            .build_url("projects/p/operations/1:fetchPredictOperation")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/v1/projects/p/operations/1:fetchPredictOperation"
        );
    }

    #[test]
    fn status_errors_are_transport() {
        let error = Error::BadResponse {
            code: 503,
            description: Some("unavailable".to_string()),
        };
        assert_eq!(error.kind(), ErrorKind::Transport);
        assert!(error.to_string().contains("503"));
    }
}
