use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use chat_replay::render::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "chat-replay")]
#[command(about = "Replay a timestamped chat transcript in sync with a video clock.")]
pub struct Args {
    /// Path to config TOML (defaults to ./config.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play a transcript against a simulated video clock and print the chat
    Replay(ReplayCmd),
    /// Write the transcript rows that fall inside the video back out as TSV
    Export(ExportCmd),
    /// Build or read `t=` deep links
    #[command(subcommand)]
    Link(LinkCmd),
    /// Print the effective default config as TOML and exit
    PrintDefaultConfig,
}

#[derive(Debug, ClapArgs)]
pub struct VideoArgs {
    /// Chat transcript (tab-separated), or '-' for stdin
    pub chat: String,

    /// Absolute transcript time at which the video starts
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub start_offset_ms: i64,

    /// Video length; rows after it are dropped
    #[arg(long)]
    pub duration_ms: i64,
}

#[derive(Debug, Parser)]
pub struct ReplayCmd {
    #[command(flatten)]
    pub video: VideoArgs,

    /// Metadata JSON with team and emote icons
    #[arg(long)]
    pub metadata: Option<String>,

    /// Start position, e.g. 1:05.200 (overrides a `t` in --url)
    #[arg(long = "t")]
    pub t: Option<String>,

    /// Page URL used for deep links and bookmarks
    #[arg(long, default_value = "http://localhost/video/")]
    pub url: String,

    /// Control script (play, wait, key, bookmark, delay, back, pause)
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Stop playback at this video position instead of the end
    #[arg(long)]
    pub until_ms: Option<i64>,

    /// Initial chat delay
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub delay_ms: i64,

    /// Override sync.max_messages from config
    #[arg(long)]
    pub max_messages: Option<usize>,

    /// Output style for chat lines
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct ExportCmd {
    #[command(flatten)]
    pub video: VideoArgs,

    /// Output file path (defaults to <input>.trimmed.tsv)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,

    /// Allow overwriting output file
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Debug, Subcommand)]
pub enum LinkCmd {
    /// Format a position in seconds as a `t` value or a full URL
    Format {
        seconds: f64,

        /// Page URL to attach the position to
        #[arg(long)]
        url: Option<String>,
    },
    /// Read a `t` value (or a URL carrying one) and print seconds
    Parse { value: String },
}
