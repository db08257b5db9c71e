use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::params::GenerationOverrides;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ImageDetail {
    #[default]
    Auto,
    Low,
    High,
}

impl ImageDetail {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageDetail::Auto => "auto",
            ImageDetail::Low => "low",
            ImageDetail::High => "high",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

/// Generation parameters shared by `chat` and `vision`.
#[derive(Debug, Clone, Default, Args)]
pub struct GenerationArgs {
    #[arg(short = 'm', long, env = "CHATGPT_MODEL", help = "Model to use [default: gpt-4o-mini]")]
    pub model: Option<String>,

    #[arg(short = 'r', long, env = "CHATGPT_ROLE", help = "Role of outgoing messages [default: user]")]
    pub role: Option<String>,

    #[arg(long, env = "CHATGPT_TEMPERATURE", help = "Sampling temperature [default: 1.0]")]
    pub temperature: Option<f32>,

    #[arg(long, env = "CHATGPT_MAX_TOKENS", help = "Completion token limit, 0 for none [default: 0]")]
    pub max_tokens: Option<u32>,

    #[arg(long, env = "CHATGPT_TOP_P", help = "Nucleus sampling mass [default: 1.0]")]
    pub top_p: Option<f32>,
}

impl GenerationArgs {
    pub fn overrides(&self) -> GenerationOverrides {
        GenerationOverrides {
            model: self.model.clone(),
            role: self.role.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct SessionArgs {
    #[arg(
        short = 's',
        long,
        env = "CHATGPT_SESSION_FILE",
        help = "Session file to resume from and save to"
    )]
    pub session_file: Option<String>,

    #[arg(
        long,
        env = "CHATGPT_SKIP_WRITE_SESSION",
        default_value_t = false,
        help = "Read the session file but never write it"
    )]
    pub skip_write_session: bool,

    #[arg(long, env = "CHATGPT_SYSTEM_MESSAGE", help = "System message for new sessions")]
    pub system_message: Option<String>,

    #[arg(long, env = "CHATGPT_EOM", help = "End-of-message marker [default: \\s]")]
    pub eom: Option<String>,

    #[arg(long, env = "CHATGPT_EOS", help = "End-of-session marker [default: \\q]")]
    pub eos: Option<String>,
}

const CLI_EXAMPLES: &str = "Examples:\n\
  chatgpt-cli chat -s notes.json\n\
  echo \"Summarize RFC 9110 in three bullets\" | chatgpt-cli chat -m gpt-4o\n\
  chatgpt-cli chat -s notes.json --skip-write-session\n\
  chatgpt-cli vision -f diagram.png \"What does this show?\"\n\
  chatgpt-cli image -m dall-e-3 --size 1792x1024 -o sunset\n\
  chatgpt-cli speech --voice nova -o greeting\n\
  chatgpt-cli transcribe -f meeting.mp3 -l en\n\
  chatgpt-cli embed --dimensions 256\n\
  chatgpt-cli replay-session -s notes.json\n\
  chatgpt-cli --profile work profiles show\n\
\n\
Session behavior:\n\
  - With --session-file, an existing file is resumed and rewritten after every successful turn.\n\
  - Without --session-file, the conversation lives only in memory.\n\
  - Model, temperature, max tokens and top-p always come from the current invocation.";

#[derive(Debug, Parser)]
#[command(name = "chatgpt-cli")]
#[command(about = "Command-line client for the OpenAI API with resumable chat sessions")]
#[command(version)]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(short = 'c', long = "config", env = "CHATGPT_CONFIG", global = true)]
    pub config_path: Option<String>,

    #[arg(long, env = "CHATGPT_PROFILE", default_value = "default", global = true)]
    pub profile: String,

    #[arg(
        short = 'k',
        long,
        env = "CHATGPT_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,

    #[arg(long, env = "CHATGPT_BASE_URL", global = true)]
    pub base_url: Option<String>,

    #[arg(short = 'v', long, env = "CHATGPT_VERBOSE", default_value_t = false, global = true)]
    pub verbose: bool,

    #[arg(long, env = "RUST_LOG", default_value = "warn", global = true)]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Chat with a model, interactively or from piped stdin")]
    Chat {
        #[command(flatten)]
        generation: GenerationArgs,
        #[command(flatten)]
        session: SessionArgs,
    },
    #[command(about = "Ask about one or more images in a single turn")]
    Vision {
        #[command(flatten)]
        generation: GenerationArgs,
        #[command(flatten)]
        session: SessionArgs,
        #[arg(short = 'd', long, value_enum, default_value_t = ImageDetail::Auto)]
        detail: ImageDetail,
        #[arg(short = 'f', long = "file", required = true)]
        files: Vec<String>,
        #[arg(help = "Question to ask; read from stdin when omitted")]
        prompt: Vec<String>,
    },
    #[command(about = "Generate images from a prompt")]
    Image {
        #[arg(short = 'm', long, default_value = "gpt-image-1")]
        model: String,
        #[arg(short = 'n', long, default_value_t = 1)]
        number: u32,
        #[arg(long)]
        quality: Option<String>,
        #[arg(short = 's', long)]
        size: Option<String>,
        #[arg(long)]
        style: Option<String>,
        #[arg(short = 'o', long)]
        output_prefix: Option<String>,
    },
    #[command(name = "text-to-speech", visible_alias = "speech", about = "Synthesize speech from text")]
    Speech {
        #[arg(short = 'm', long, default_value = "tts-1")]
        model: String,
        #[arg(long, default_value = "alloy")]
        voice: String,
        #[arg(short = 's', long, default_value_t = 1.0)]
        speed: f64,
        #[arg(short = 'o', long)]
        output_prefix: Option<String>,
    },
    #[command(about = "Transcribe audio files to text")]
    Transcribe {
        #[arg(short = 'm', long, default_value = "whisper-1")]
        model: String,
        #[arg(short = 'l', long)]
        language: Option<String>,
        #[arg(short = 'f', long = "file", required = true)]
        files: Vec<String>,
        #[arg(long, help = "Prompt that guides the transcription style")]
        system_message: Option<String>,
    },
    #[command(visible_alias = "embed", about = "Create embedding vectors for text")]
    Embedding {
        #[arg(short = 'm', long, default_value = "text-embedding-3-small")]
        model: String,
        #[arg(long, default_value_t = 0, help = "Output dimensions, 0 for the model default")]
        dimensions: u32,
    },
    #[command(about = "List models available to the API key")]
    ListModels,
    #[command(about = "Print a saved session transcript")]
    ReplaySession {
        #[arg(short = 's', long, required = true)]
        session_file: String,
    },
    #[command(about = "Print the version")]
    Version,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Check credentials, configuration and an optional session file")]
    Doctor {
        #[arg(short = 's', long)]
        session_file: Option<String>,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Chat { .. } => "chat".to_string(),
        Commands::Vision { .. } => "vision".to_string(),
        Commands::Image { .. } => "image".to_string(),
        Commands::Speech { .. } => "text-to-speech".to_string(),
        Commands::Transcribe { .. } => "transcribe".to_string(),
        Commands::Embedding { .. } => "embedding".to_string(),
        Commands::ListModels => "list-models".to_string(),
        Commands::ReplaySession { .. } => "replay-session".to_string(),
        Commands::Version => "version".to_string(),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Doctor { .. } => "doctor".to_string(),
    }
}

/// Whether the command talks to the API and so needs a key up front.
pub fn requires_api_key(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::ReplaySession { .. }
            | Commands::Version
            | Commands::Profiles { .. }
            | Commands::Doctor { .. }
    )
}
