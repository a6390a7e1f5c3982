use crate::utils::{decode_work_dir, init_logging, load_config};
use autoreg::{
    handoff, CompletionReporter, InputError, RegistrationError, RegistrationOrchestrator,
    RegistrationSession, WebDriverLauncher,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod utils;

#[derive(Parser, Debug)]
#[command(name = "autoreg")]
#[command(author, version, about = "Browser-driven account registration")]
struct Cli {
    /// YAML or JSON configuration file
    #[arg(long, global = true, env = "AUTOREG_CONFIG")]
    config: Option<PathBuf>,

    /// WebDriver server URL, overrides the configuration file
    #[arg(long, global = true, env = "AUTOREG_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
struct RegisterArgs {
    email: String,

    first_name: Option<String>,

    last_name: Option<String>,

    /// Open the browser in private mode (default: true)
    #[arg(value_parser = clap::builder::BoolishValueParser::new())]
    use_incognito: Option<bool>,

    /// Work directory, plain or base64-encoded
    work_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one registration
    Register(RegisterArgs),
    /// Deliver a verification code to a waiting registration
    SubmitCode {
        /// Six-digit code
        code: String,
    },
    /// Cancel a registration waiting for its verification code
    Cancel,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialise logging: {e}");
    }

    let config = match load_config(cli.config.as_deref(), cli.webdriver_url.clone()) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Register(args) => register(config, args).await,
        Commands::SubmitCode { code } => match handoff::write_code(&config.handoff, &code) {
            Ok(path) => {
                info!("Verification code written to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Cancel => match handoff::write_cancel(&config.handoff) {
            Ok(path) => {
                info!("Cancel request written to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn register(config: autoreg::RegistrationConfig, args: RegisterArgs) -> ExitCode {
    let mut identity = RegistrationSession::builder(args.email.as_str())
        .use_incognito(args.use_incognito.unwrap_or(true));
    if let Some(first) = args.first_name {
        identity = identity.first_name(first);
    }
    if let Some(last) = args.last_name {
        identity = identity.last_name(last);
    }
    if let Some(raw) = args.work_dir.as_deref() {
        identity = identity.work_dir(decode_work_dir(raw));
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            interrupt.cancel();
        }
    });

    let reporter = Arc::new(CompletionReporter::stdout(config.language.catalog()));
    let launcher = Arc::new(WebDriverLauncher::new(config.webdriver.clone()));
    let orchestrator = RegistrationOrchestrator::new(config, launcher, reporter, cancel);

    match orchestrator.run(identity).await {
        Ok(report) => {
            info!(
                success = report.record.success,
                kept_open = report.kept_open,
                "Registration attempt finished"
            );
            ExitCode::SUCCESS
        }
        Err(RegistrationError::Input(e)) => {
            if let Err(e) = write_input_error(&mut io::stdout(), &args.email, &e) {
                debug!("Could not write input error: {}", e);
            }
            ExitCode::FAILURE
        }
        Err(RegistrationError::Output(_)) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Registration aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// One failure line for input rejected before a browser opens. A closed
/// stdout is reported as an error rather than a panic.
fn write_input_error(out: &mut impl Write, email: &str, error: &InputError) -> io::Result<()> {
    let line = json!({
        "success": false,
        "email": email,
        "message": error.to_string(),
        "status": "failed",
        "error": error.to_string(),
    });
    writeln!(out, "{line}")?;
    out.flush()
}
