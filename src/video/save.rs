use base64::{engine::general_purpose::STANDARD, Engine as _};
use snafu::{OptionExt, ResultExt, Snafu};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use super::model::VideoPayload;
use crate::ErrorKind;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("video payload has no base64 data (expected 'bytesBase64Encoded' or 'data')"))]
    MissingData,

    #[snafu(display("video payload is not valid base64"))]
    InvalidBase64 { source: base64::DecodeError },

    #[snafu(display("failed to write video to '{}'", path.display()))]
    Write {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingData | Error::InvalidBase64 { .. } => ErrorKind::Protocol,
            Error::Write { .. } => ErrorKind::Storage,
        }
    }
}

impl VideoPayload {
    /// Decodes the embedded video bytes.
    pub fn decode(&self) -> Result<Vec<u8>, Error> {
        let encoded = self.base64_data().context(MissingDataSnafu)?;
        STANDARD.decode(encoded).context(InvalidBase64Snafu)
    }
}

/// Decodes `payload` and writes the bytes to `path`, replacing any existing file.
///
/// Nothing is written unless the payload decodes cleanly.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn save(payload: &VideoPayload, path: impl AsRef<Path>) -> Result<(), Error> {
    let bytes = payload.decode()?;
    write(&bytes, path).await
}

/// Writes already decoded video bytes to `path`, replacing any existing file.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn write(bytes: &[u8], path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    tokio::fs::write(path, bytes)
        .await
        .context(WriteSnafu { path })?;

    info!(bytes = bytes.len(), "video saved");
    Ok(())
}
