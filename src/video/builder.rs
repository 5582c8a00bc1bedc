use snafu::{OptionExt, ResultExt};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};

use super::{
    model::{GenerationParameters, GenerationRequest, Instance, OperationReference, VideoConfig},
    ClientSnafu, Error, MissingOperationNameSnafu, OperationHandle,
};
use crate::{auth::Credentials, client::VeoClient};

/// Video length used when none is set.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(8);

/// Builder for video generation requests
#[derive(Debug, Clone)]
pub struct GenerationBuilder {
    client: Arc<VeoClient>,
    prompt: String,
    duration: Duration,
    sample_count: u32,
    generate_audio: bool,
}

impl GenerationBuilder {
    pub(crate) fn new(client: Arc<VeoClient>) -> Self {
        Self {
            client,
            prompt: String::new(),
            duration: DEFAULT_DURATION,
            sample_count: 1,
            generate_audio: true,
        }
    }

    /// Sets the text prompt to generate from.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Sets the length of each generated video. Only whole seconds are sent.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets how many videos to generate for the prompt.
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Enables or disables generated audio.
    pub fn with_audio(mut self, generate_audio: bool) -> Self {
        self.generate_audio = generate_audio;
        self
    }

    /// Builds the request body without sending it.
    pub fn build(&self) -> GenerationRequest {
        GenerationRequest {
            instances: vec![Instance {
                prompt: self.prompt.clone(),
            }],
            parameters: GenerationParameters {
                sample_count: self.sample_count,
                video_config: VideoConfig {
                    duration: self.duration,
                    generate_audio: self.generate_audio,
                },
            },
        }
    }

    /// Submits the request and returns a handle to the resulting operation.
    ///
    /// # Errors
    ///
    /// A non-2xx reply surfaces as [`Error::Client`]. A 2xx reply without an operation
    /// name is a contract violation and surfaces as [`Error::MissingOperationName`].
    #[instrument(skip_all, fields(
        model = %self.client.model,
        location = %self.client.location,
        project = %credentials.project_id(),
        samples = self.sample_count,
    ))]
    pub async fn execute(self, credentials: &Credentials) -> Result<OperationHandle, Error> {
        let request = self.build();
        let reference: OperationReference = self
            .client
            .predict_long_running(credentials, &request)
            .await
            .map_err(Box::new)
            .context(ClientSnafu)?;

        let name = reference
            .name
            .filter(|name| !name.is_empty())
            .context(MissingOperationNameSnafu)?;

        info!(operation.name = %name, "video generation submitted");
        Ok(OperationHandle::new(self.client, name))
    }
}
