//! The Batch module drives a folder of prompt files through generation.
//!
//! Every `*.txt` file in the folder is one prompt. Files are processed one at a time in
//! file-name order: submit, poll, save. A failure in any stage is recorded against that
//! prompt only; the batch always moves on to the next file and finishes with a
//! [`BatchReport`].
//!
//! ## Example usage:
//! ```rust,ignore
//! use std::sync::Arc;
//! use veo_batch::{AdcCredentials, BatchOptions, BatchRunner, Veo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let veo = Veo::new("us-central1")?;
//!     let credentials = Arc::new(AdcCredentials::discover(None).await?);
//!     let report = BatchRunner::new(veo, credentials)
//!         .with_options(BatchOptions::default())
//!         .run("prompts")
//!         .await?;
//!
//!     println!("{} saved, {} failed", report.saved(), report.failed());
//!     Ok(())
//! }
//! ```

use snafu::{ensure, ResultExt, Snafu};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{CredentialProvider, Error as CredentialsError},
    client::Veo,
    retry::RetryPolicy,
    video::{
        self,
        builder::DEFAULT_DURATION,
        handle::{DEFAULT_DEADLINE, DEFAULT_POLL_INTERVAL},
        Operation, SaveError,
    },
    ErrorKind,
};

/// Extension of the files treated as prompts.
pub const PROMPT_EXTENSION: &str = "txt";

/// Extension given to saved videos.
pub const VIDEO_EXTENSION: &str = "mp4";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("no .txt prompt files found in '{}'", folder.display()))]
    NoPrompts { folder: PathBuf },

    #[snafu(display("failed to list prompt folder '{}'", folder.display()))]
    ReadFolder {
        source: std::io::Error,
        folder: PathBuf,
    },

    #[snafu(display("unable to obtain credentials for the batch"))]
    Credentials { source: CredentialsError },

    #[snafu(display("failed to create output directory '{}'", path.display()))]
    CreateOutputDir {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoPrompts { .. } | Error::ReadFolder { .. } | Error::CreateOutputDir { .. } => {
                ErrorKind::Storage
            }
            Error::Credentials { .. } => ErrorKind::Credentials,
        }
    }
}

/// Where in the submit → poll → save pipeline a prompt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Credentials,
    Submit,
    Poll,
    Save,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Credentials => "credentials",
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::Save => "save",
        };
        f.write_str(name)
    }
}

/// Why a single prompt failed.
#[derive(Debug, Snafu)]
pub enum StageError {
    #[snafu(display("failed to read prompt file '{}'", path.display()))]
    ReadPrompt {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to refresh credentials"))]
    RefreshCredentials { source: CredentialsError },

    #[snafu(display("submission failed"))]
    Submit { source: video::Error },

    #[snafu(display("polling failed"))]
    Poll { source: video::Error },

    #[snafu(display("saving video {index} failed"))]
    Save { source: SaveError, index: usize },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::ReadPrompt { .. } => Stage::Read,
            StageError::RefreshCredentials { .. } => Stage::Credentials,
            StageError::Submit { .. } => Stage::Submit,
            StageError::Poll { .. } => Stage::Poll,
            StageError::Save { .. } => Stage::Save,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::ReadPrompt { .. } => ErrorKind::Storage,
            StageError::RefreshCredentials { source } => source.kind(),
            StageError::Submit { source } | StageError::Poll { source } => source.kind(),
            StageError::Save { source, .. } => source.kind(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The file held nothing but whitespace.
    EmptyPrompt,
}

/// What happened to one prompt.
#[derive(Debug)]
pub enum PromptOutcome {
    Saved {
        operation: String,
        paths: Vec<PathBuf>,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        error: StageError,
    },
}

/// A prompt file discovered in the input folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFile {
    /// File stem; names the prompt in logs and output files.
    pub id: String,
    pub path: PathBuf,
}

impl PromptFile {
    /// Reads and trims the prompt. `None` when nothing but whitespace remains.
    pub async fn read(&self) -> std::io::Result<Option<String>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

#[derive(Debug)]
pub struct PromptReport {
    pub prompt: PromptFile,
    pub outcome: PromptOutcome,
}

/// Per-prompt outcomes of a batch run, in processing order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub prompts: Vec<PromptReport>,
}

impl BatchReport {
    pub fn saved(&self) -> usize {
        self.count(|outcome| matches!(outcome, PromptOutcome::Saved { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, PromptOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, PromptOutcome::Failed { .. }))
    }

    /// Outcome for the prompt with the given id.
    pub fn outcome(&self, id: &str) -> Option<&PromptOutcome> {
        self.prompts
            .iter()
            .find(|report| report.prompt.id == id)
            .map(|report| &report.outcome)
    }

    fn count(&self, predicate: impl Fn(&PromptOutcome) -> bool) -> usize {
        self.prompts
            .iter()
            .filter(|report| predicate(&report.outcome))
            .count()
    }
}

/// Generation settings applied to every prompt of a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub duration: Duration,
    pub sample_count: u32,
    pub generate_audio: bool,
    pub poll_interval: Duration,
    pub deadline: Duration,
    /// Policy for the submission call. Only transport failures are retried.
    pub retry: RetryPolicy,
    /// Directory for the videos; next to each prompt file when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            sample_count: 1,
            generate_audio: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_DEADLINE,
            retry: RetryPolicy::default(),
            output_dir: None,
        }
    }
}

/// Lists the prompt files of `folder`, sorted by file name.
pub async fn discover_prompts(folder: &Path) -> Result<Vec<PromptFile>, Error> {
    let mut entries = tokio::fs::read_dir(folder)
        .await
        .context(ReadFolderSnafu { folder })?;

    let mut prompts = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context(ReadFolderSnafu { folder })?
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(PROMPT_EXTENSION) {
            continue;
        }
        // Follows symlinks. A dangling link is kept so its read failure lands on the prompt.
        let is_file = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.is_file(),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => true,
            Err(source) => return Err(source).context(ReadFolderSnafu { folder }),
        };
        let Some(stem) = path.file_stem() else {
            continue;
        };
        if is_file {
            prompts.push(PromptFile {
                id: stem.to_string_lossy().into_owned(),
                path,
            });
        }
    }

    prompts.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(prompts)
}

/// Runs prompts through submit → poll → save, strictly one at a time.
pub struct BatchRunner {
    veo: Veo,
    credentials: Arc<dyn CredentialProvider>,
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(veo: Veo, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            veo,
            credentials,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Processes every prompt file in `folder`.
    ///
    /// # Errors
    ///
    /// Only batch-wide problems are errors: an unreadable folder, a folder without
    /// prompt files, credentials that cannot be obtained at all, or an output directory
    /// that cannot be created. Per-prompt failures land in the report.
    #[instrument(skip_all, fields(folder = %folder.as_ref().display(), model = %self.veo.model()))]
    pub async fn run(&self, folder: impl AsRef<Path>) -> Result<BatchReport, Error> {
        let folder = folder.as_ref();
        let prompts = discover_prompts(folder).await?;
        ensure!(!prompts.is_empty(), NoPromptsSnafu { folder });

        let credentials = self.credentials.credentials().await.context(CredentialsSnafu)?;
        info!(
            prompts = prompts.len(),
            project = %credentials.project_id(),
            "starting batch"
        );

        if let Some(dir) = &self.options.output_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .context(CreateOutputDirSnafu { path: dir })?;
        }

        let mut report = BatchReport::default();
        for prompt in prompts {
            let outcome = self.process(&prompt).await;
            report.prompts.push(PromptReport { prompt, outcome });
        }

        info!(
            saved = report.saved(),
            skipped = report.skipped(),
            failed = report.failed(),
            "batch finished"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(prompt = %prompt.id))]
    async fn process(&self, prompt: &PromptFile) -> PromptOutcome {
        match self.try_process(prompt).await {
            Ok(outcome) => outcome,
            Err(error) => {
                error!(
                    stage = %error.stage(),
                    error.kind = %error.kind(),
                    error.chained = %display_error_chain::DisplayErrorChain::new(&error),
                    "failed to process {}",
                    prompt.id
                );
                PromptOutcome::Failed { error }
            }
        }
    }

    async fn try_process(&self, prompt: &PromptFile) -> Result<PromptOutcome, StageError> {
        let Some(text) = prompt
            .read()
            .await
            .context(ReadPromptSnafu { path: &prompt.path })?
        else {
            warn!("skipping {}: file is empty", prompt.id);
            return Ok(PromptOutcome::Skipped {
                reason: SkipReason::EmptyPrompt,
            });
        };

        let credentials = self
            .credentials
            .credentials()
            .await
            .context(RefreshCredentialsSnafu)?;

        info!("submitting {}", prompt.id);
        let request = self
            .veo
            .generate_video()
            .with_prompt(text)
            .with_duration(self.options.duration)
            .with_sample_count(self.options.sample_count)
            .with_audio(self.options.generate_audio);

        let handle = self
            .options
            .retry
            .run(
                "submit",
                |error: &video::Error| error.kind() == ErrorKind::Transport,
                || request.clone().execute(&credentials),
            )
            .await
            .context(SubmitSnafu)?
            .with_poll_interval(self.options.poll_interval)
            .with_deadline(self.options.deadline);

        let operation = handle
            .wait_until_done(&credentials)
            .await
            .context(PollSnafu)?;

        let paths = self.save_videos(prompt, &operation).await?;
        Ok(PromptOutcome::Saved {
            operation: handle.name().to_string(),
            paths,
        })
    }

    async fn save_videos(
        &self,
        prompt: &PromptFile,
        operation: &Operation,
    ) -> Result<Vec<PathBuf>, StageError> {
        // Decode every sample first so a bad payload leaves no video behind.
        let decoded = operation
            .videos()
            .iter()
            .enumerate()
            .map(|(index, payload)| payload.decode().context(SaveSnafu { index }))
            .collect::<Result<Vec<_>, StageError>>()?;

        let mut paths = Vec::with_capacity(decoded.len());
        for (index, bytes) in decoded.iter().enumerate() {
            let path = self.output_path(prompt, index);
            video::save::write(bytes, &path)
                .await
                .context(SaveSnafu { index })?;
            info!("saved {}", path.display());
            paths.push(path);
        }
        Ok(paths)
    }

    /// `<stem>.mp4` for the first video, `<stem>_<n>.mp4` for the n-th after that.
    fn output_path(&self, prompt: &PromptFile, index: usize) -> PathBuf {
        let dir = match &self.options.output_dir {
            Some(dir) => dir.as_path(),
            None => prompt.path.parent().unwrap_or_else(|| Path::new("")),
        };
        let file_name = match index {
            0 => format!("{}.{VIDEO_EXTENSION}", prompt.id),
            n => format!("{}_{}.{VIDEO_EXTENSION}", prompt.id, n + 1),
        };
        dir.join(file_name)
    }
}
