use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use llm_scaffold::{AppType, BraceFallback, CliOverrides, ProviderKind};

#[derive(Parser, Debug)]
#[command(
    name = "llm-scaffold",
    version,
    about = "Generate a project from a plain-language description using an LLM",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). Logs go to stderr.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub generate: GenerateArgs,
}

impl Cli {
    /// The subcommand to run; `generate` when none was given.
    pub fn into_command(self) -> Commands {
        self.command
            .unwrap_or(Commands::Generate(self.generate))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Describe an app and generate its files (default)
    Generate(GenerateArgs),
    /// Run extraction and validation on a saved model response
    Extract {
        /// File holding the raw model response
        file: PathBuf,
        /// Brace strategy used after the fenced-block search
        #[arg(long, value_name = "STRATEGY")]
        fallback: Option<BraceFallback>,
    },
    /// List app types, or print the system instruction for one
    Templates {
        app_type: Option<AppType>,
    },
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct GenerateArgs {
    /// Kind of project: web-app, term-app or simple-code
    #[arg(long, value_name = "TYPE")]
    pub app_type: Option<AppType>,

    /// Project folder name (default: prompt, then "my-app")
    #[arg(long)]
    pub name: Option<String>,

    /// App description (skips the editor)
    #[arg(long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Read the app description from a file
    #[arg(long, value_name = "FILE")]
    pub prompt_file: Option<PathBuf>,

    /// Directory that receives the project folder
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub provider: Option<ProviderKind>,

    #[arg(long)]
    pub model: Option<String>,

    /// Provider base URL (e.g. http://localhost:11434)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Print fragments as they arrive
    #[arg(long, overrides_with = "no_stream")]
    pub stream: bool,

    /// Wait for the complete response behind a spinner
    #[arg(long, overrides_with = "stream")]
    pub no_stream: bool,

    /// Ask the provider for JSON-only output
    #[arg(long)]
    pub json_mode: bool,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Limit for the whole generation, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Skip the description preview
    #[arg(short, long)]
    pub yes: bool,

    /// Also save the raw model response to FILE
    #[arg(long, value_name = "FILE")]
    pub save_raw: Option<PathBuf>,

    /// Type the description on stdin instead of opening $EDITOR
    #[arg(long)]
    pub no_editor: bool,
}

impl GenerateArgs {
    pub fn overrides(&self) -> CliOverrides {
        let stream = if self.no_stream {
            Some(false)
        } else if self.stream {
            Some(true)
        } else {
            None
        };
        CliOverrides {
            provider: self.provider,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            stream,
            json_mode: self.json_mode.then_some(true),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs,
            output_dir: self.output_dir.clone(),
        }
    }
}
