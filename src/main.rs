use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatgpt_cli::chat::{run_chat, run_vision};
use chatgpt_cli::cli::{Cli, Commands, ProfileCommands, command_label, requires_api_key};
use chatgpt_cli::config::{
    RuntimeConfig, discover_config_path, load_profiles, resolve_runtime_config,
};
use chatgpt_cli::doctor::run_doctor;
use chatgpt_cli::embedding::run_embedding;
use chatgpt_cli::error::{categorize_error, format_cli_error, redact_sensitive_text};
use chatgpt_cli::image::{ImageOptions, run_image};
use chatgpt_cli::models::run_list_models;
use chatgpt_cli::profiles::{run_profiles_list, run_profiles_show};
use chatgpt_cli::replay::run_replay_session;
use chatgpt_cli::speech::{SpeechOptions, run_speech};
use chatgpt_cli::telemetry::{TelemetryEvent, TelemetrySink, unix_ms_now};
use chatgpt_cli::transcribe::{TranscribeOptions, run_transcribe};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(
            category = %categorize_error(&err).code(),
            error = %redact_sensitive_text(&format!("{err:#}")),
            "command failed"
        );
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter, cli.verbose)?;
    let config_path = discover_config_path(cli.config_path.as_deref());
    let profiles = load_profiles(config_path.as_deref())?;
    let cfg = resolve_runtime_config(&cli, &profiles, config_path)?;

    let label = command_label(&cli.command);
    let telemetry = TelemetrySink::new(&cfg, label.clone());
    let started = unix_ms_now();
    telemetry.emit(TelemetryEvent::CommandStarted);

    // Fail fast on a missing key before any session file is touched.
    let result = if requires_api_key(&cli.command) {
        cfg.require_api_key().map(|_| ()).map_err(anyhow::Error::from)
    } else {
        Ok(())
    };
    let result = match result {
        Ok(()) => dispatch(&cli, &cfg, &profiles, &telemetry).await,
        Err(err) => Err(err),
    };

    let duration_ms = unix_ms_now().saturating_sub(started);
    match &result {
        Ok(()) => telemetry.emit(TelemetryEvent::CommandCompleted { duration_ms }),
        Err(err) => telemetry.emit(TelemetryEvent::CommandFailed {
            duration_ms,
            category: categorize_error(err).code(),
            error: redact_sensitive_text(&format!("{err:#}")),
        }),
    }
    tracing::debug!(command = %label, duration_ms, "command finished");
    result
}

async fn dispatch(
    cli: &Cli,
    cfg: &RuntimeConfig,
    profiles: &chatgpt_cli::config::ProfilesFile,
    telemetry: &TelemetrySink,
) -> Result<()> {
    match &cli.command {
        Commands::Chat {
            generation,
            session,
        } => run_chat(cfg, generation, session, telemetry).await?,
        Commands::Vision {
            generation,
            session,
            detail,
            files,
            prompt,
        } => run_vision(cfg, generation, session, *detail, files, prompt, telemetry).await?,
        Commands::Image {
            model,
            number,
            quality,
            size,
            style,
            output_prefix,
        } => {
            let options = ImageOptions {
                model: model.clone(),
                number: *number,
                quality: quality.clone(),
                size: size.clone(),
                style: style.clone(),
            };
            run_image(cfg, &options, output_prefix.as_deref()).await?
        }
        Commands::Speech {
            model,
            voice,
            speed,
            output_prefix,
        } => {
            let options = SpeechOptions {
                model: model.clone(),
                voice: voice.clone(),
                speed: *speed,
            };
            run_speech(cfg, &options, output_prefix.as_deref()).await?
        }
        Commands::Transcribe {
            model,
            language,
            files,
            system_message,
        } => {
            let options = TranscribeOptions {
                model: model.clone(),
                language: language.clone(),
                prompt: system_message.clone(),
            };
            run_transcribe(cfg, &options, files).await?
        }
        Commands::Embedding { model, dimensions } => {
            run_embedding(cfg, model, *dimensions).await?
        }
        Commands::ListModels => run_list_models(cfg).await?,
        Commands::ReplaySession { session_file } => run_replay_session(session_file)?,
        Commands::Version => println!("chatgpt-cli v{}", env!("CARGO_PKG_VERSION")),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => run_profiles_list(profiles, cfg)?,
            ProfileCommands::Show => run_profiles_show(cfg)?,
        },
        Commands::Doctor { session_file } => run_doctor(cfg, session_file.as_deref())?,
    }

    Ok(())
}

fn init_tracing(log_filter: &str, verbose: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { log_filter };
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
