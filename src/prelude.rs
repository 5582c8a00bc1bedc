//! # Prelude for the veo-batch Crate
//!
//! This module re-exports the most commonly used types for convenience.
//!
//! ```rust,ignore
//! use veo_batch::prelude::*;
//! ```

pub use crate::auth::{AdcCredentials, CredentialProvider, Credentials, StaticCredentials};
pub use crate::batch::{BatchOptions, BatchReport, BatchRunner, PromptOutcome};
pub use crate::client::{Model, Veo};
pub use crate::error::ErrorKind;
pub use crate::retry::RetryPolicy;
pub use crate::video::{GenerationBuilder, Operation, OperationHandle, VideoPayload};
