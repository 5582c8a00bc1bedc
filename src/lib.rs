//! # veo-batch
//!
//! Bulk video generation with Vertex AI Veo: submit prompts as long-running
//! operations, poll them to completion, and write the returned videos to disk.

mod auth;
pub mod batch;
mod client;
mod common;
mod error;
pub mod prelude;
pub mod retry;
pub mod video;


pub use auth::{
    AdcCredentials, CredentialProvider, Credentials, Error as CredentialsError,
    StaticCredentials, CLOUD_PLATFORM_SCOPE,
};
pub use batch::{
    BatchOptions, BatchReport, BatchRunner, Error as BatchError, PromptFile, PromptOutcome,
    PromptReport, SkipReason, Stage, StageError,
};
pub use client::{Error as ClientError, Model, Veo, DEFAULT_LOCATION, REQUEST_TIMEOUT};
pub use error::ErrorKind;
pub use retry::{Backoff, RetryPolicy};
pub use video::{
    builder::DEFAULT_DURATION,
    handle::{DEFAULT_DEADLINE, DEFAULT_POLL_INTERVAL},
    Error as VideoError, GenerationBuilder, GenerationRequest, Operation, OperationHandle,
    SaveError, VideoPayload,
};
