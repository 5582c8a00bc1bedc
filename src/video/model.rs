//! Wire types for the Veo `predictLongRunning` and `fetchPredictOperation` endpoints.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::serde::duration_as_seconds;

/// Body of a `predictLongRunning` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub instances: Vec<Instance>,
    pub parameters: GenerationParameters,
}

/// A single prompt to generate from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    /// Number of videos to produce for the prompt
    pub sample_count: u32,
    pub video_config: VideoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    /// Length of each video, sent as `"<N>s"`
    #[serde(with = "duration_as_seconds")]
    pub duration: Duration,
    /// Whether the model should synthesise a soundtrack
    pub generate_audio: bool,
}

/// Body of a `fetchPredictOperation` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchOperationRequest {
    pub operation_name: String,
}

/// The reply to `predictLongRunning`: just enough to find the operation again.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct OperationReference {
    #[serde(default)]
    pub name: Option<String>,
}

/// A snapshot of a long-running operation.
///
/// Every poll produces a new snapshot; nothing is patched in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Resource name, e.g.
    /// `projects/p/locations/us-central1/publishers/google/models/veo-3.0-generate-preview/operations/123`.
    /// Some snapshots omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether the operation has reached a terminal state. Absent means "still running".
    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<OperationResponse>,

    /// Set instead of `response` when the operation failed server-side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl Operation {
    /// Videos carried by a completed operation; empty while running.
    pub fn videos(&self) -> &[VideoPayload] {
        self.response
            .as_ref()
            .map(|response| response.videos.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    #[serde(default)]
    pub videos: Vec<VideoPayload>,

    /// Number of samples dropped by responsible-AI filtering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rai_media_filtered_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rai_media_filtered_reasons: Option<Vec<String>>,
}

/// Represents an error within a long-running operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationError {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// One generated video.
///
/// The bytes arrive base64-encoded under `bytesBase64Encoded`; some responses use `data`
/// instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_base64_encoded: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Only set when the request asked for Cloud Storage output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs_uri: Option<String>,
}

impl VideoPayload {
    /// The base64 text to decode: `bytesBase64Encoded` if present and non-empty, else `data`.
    pub fn base64_data(&self) -> Option<&str> {
        [&self.bytes_base64_encoded, &self.data]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .find(|value| !value.is_empty())
    }
}
