//! Consent waiver command-line tool
//!
//! - `render`: lay out and encode a waiver PDF from a form JSON file
//! - `submit`: run the full store-then-submit pipeline from a TOML config

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use waiver_core::{render_waiver, ConsentForm, SignatureImage, WaiverSubmission};
use waiver_submit::{AuthState, ConsentSession, ConsentSubmitter, Denied, SubmitConfig};

#[derive(Parser, Debug)]
#[command(name = "waiver")]
#[command(about = "Gym consent waiver rendering and submission")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a waiver PDF locally
    Render {
        /// Consent form as JSON (camelCase field names)
        #[arg(long)]
        form: PathBuf,

        /// Signature PNG
        #[arg(long)]
        signature: Option<PathBuf>,

        /// Output PDF path
        #[arg(long, default_value = "waiver.pdf")]
        out: PathBuf,
    },

    /// Store the waiver and submit consent
    Submit {
        /// Submission config (TOML)
        #[arg(long, default_value = "waiver.toml")]
        config: PathBuf,

        /// Consent form as JSON (camelCase field names)
        #[arg(long)]
        form: PathBuf,

        /// Signature PNG
        #[arg(long)]
        signature: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Render {
            form,
            signature,
            out,
        } => render(&form, signature.as_deref(), &out),
        Command::Submit {
            config,
            form,
            signature,
        } => submit(&config, &form, signature.as_deref()).await,
    }
}

fn load_form(path: &Path) -> anyhow::Result<ConsentForm> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read form file: {}", path.display()))?;
    serde_json::from_str(&json).context("Failed to parse consent form JSON")
}

fn load_signature(path: Option<&Path>) -> anyhow::Result<Option<SignatureImage>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let png = fs::read(path)
        .with_context(|| format!("Failed to read signature file: {}", path.display()))?;
    Ok(Some(SignatureImage::from_png(png)?))
}

fn render(form: &Path, signature: Option<&Path>, out: &Path) -> anyhow::Result<ExitCode> {
    let form = load_form(form)?;
    let signature = load_signature(signature)?;

    let submission = match WaiverSubmission::new(form, signature) {
        Ok(submission) => submission,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let document = render_waiver(&submission, Utc::now())?;
    fs::write(out, &document.bytes)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    info!(pages = document.page_count, out = %out.display(), "rendered waiver");
    println!("{}", out.display());
    Ok(ExitCode::SUCCESS)
}

async fn submit(
    config_path: &Path,
    form: &Path,
    signature: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let mut config = SubmitConfig::from_file(config_path)?;
    config.apply_env_overrides();
    let submitter = ConsentSubmitter::from_config(&config)?;

    let auth = match submitter.identity().current_principal() {
        Some(principal) => AuthState::SignedIn(principal),
        None => AuthState::SignedOut,
    };
    let mut session = match ConsentSession::open(&auth) {
        Ok(session) => session,
        Err(Denied::Redirect(to)) => {
            eprintln!("Not signed in (redirect to {})", to);
            return Ok(ExitCode::FAILURE);
        }
        Err(Denied::Wait) => anyhow::bail!("identity provider has not reported a user yet"),
    };

    session.form = load_form(form)?;
    if let Some(signature) = load_signature(signature)? {
        session.set_signature(signature);
    }

    match session.submit(&submitter).await {
        Ok(redirect) => {
            println!("{}", redirect.to);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
