use clap::{Args, Parser, Subcommand};
use display_error_chain::DisplayErrorChain;
use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};
use tracing::info;
use veo_batch::{
    AdcCredentials, BatchOptions, BatchRunner, Model, RetryPolicy, Veo, DEFAULT_DEADLINE,
    DEFAULT_LOCATION,
};

#[derive(Parser)]
#[command(author, version, about = "Bulk generate videos using Vertex AI Veo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate videos for every .txt prompt in FOLDER
    All(AllArgs),
}

#[derive(Args)]
struct AllArgs {
    /// Folder holding one prompt per .txt file
    folder: PathBuf,

    /// Veo model id
    #[arg(long, default_value_t = Model::default().to_string())]
    model: String,

    /// Vertex AI region
    #[arg(long, env = "GOOGLE_CLOUD_LOCATION", default_value = DEFAULT_LOCATION)]
    location: String,

    /// Video length in seconds
    #[arg(long, default_value_t = 8)]
    duration: u64,

    /// Videos to generate per prompt
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,

    /// Seconds between status polls
    #[arg(long, default_value_t = 5)]
    poll: u64,

    /// Generate silent videos
    #[arg(long)]
    no_audio: bool,

    /// Project to bill; discovered from the credentials when omitted
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project: Option<String>,

    /// Write videos here instead of next to the prompt files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Seconds to wait before retrying a failed submission
    #[arg(long, default_value_t = 2)]
    retry_delay: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::All(args) => generate_all(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error_chain = DisplayErrorChain::new(e.as_ref());
            tracing::error!(error.debug = ?e, error.chained = %error_chain, "execution failed");
            ExitCode::FAILURE
        }
    }
}

async fn generate_all(args: AllArgs) -> Result<(), Box<dyn std::error::Error>> {
    let veo = Veo::with_model(args.location, args.model)?;
    let credentials = AdcCredentials::discover(args.project).await?;

    let options = BatchOptions {
        duration: Duration::from_secs(args.duration),
        sample_count: args.count,
        generate_audio: !args.no_audio,
        poll_interval: Duration::from_secs(args.poll),
        deadline: DEFAULT_DEADLINE,
        retry: RetryPolicy::default().with_delay(Duration::from_secs(args.retry_delay)),
        output_dir: args.output_dir,
    };

    let report = BatchRunner::new(veo, Arc::new(credentials))
        .with_options(options)
        .run(&args.folder)
        .await?;

    info!(
        saved = report.saved(),
        skipped = report.skipped(),
        failed = report.failed(),
        "done"
    );
    Ok(())
}
