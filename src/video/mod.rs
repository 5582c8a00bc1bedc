//! Veo video generation: submit a prompt, poll the long-running operation, save the result.

pub mod builder;
pub mod handle;
pub mod model;
pub mod save;

use snafu::Snafu;
use std::time::Duration;

use crate::{client::Error as ClientError, ErrorKind};

pub use builder::GenerationBuilder;
pub use handle::OperationHandle;
pub use model::{
    FetchOperationRequest, GenerationParameters, GenerationRequest, Instance, Operation,
    OperationError, OperationResponse, VideoConfig, VideoPayload,
};
pub use save::{save, Error as SaveError};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("client invocation error"))]
    Client { source: Box<ClientError> },

    #[snafu(display("server accepted the request but returned no operation name - API contract violation"))]
    MissingOperationName,

    #[snafu(display(
        "operation '{name}' completed without a video payload{}{}",
        filtered.map(|n| format!(" ({n} sample(s) removed by content filtering)")).unwrap_or_default(),
        if reasons.is_empty() { String::new() } else { format!(": {}", reasons.join("; ")) }
    ))]
    MissingVideos {
        /// Operation name.
        name: String,
        /// Samples the service filtered out, if it said so.
        filtered: Option<u32>,
        /// Filter reasons reported alongside the count.
        reasons: Vec<String>,
    },

    #[snafu(display("operation '{name}' failed with code {code}: {message}"))]
    OperationFailed {
        /// Operation name.
        name: String,
        code: i32,
        message: String,
    },

    #[snafu(display("operation '{name}' did not complete within {waited:?}"))]
    Timeout {
        /// Operation name.
        name: String,
        waited: Duration,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Client { source } => source.kind(),
            Error::MissingOperationName
            | Error::MissingVideos { .. }
            | Error::OperationFailed { .. } => ErrorKind::Protocol,
            Error::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}
