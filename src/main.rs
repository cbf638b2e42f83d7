use std::path::PathBuf;

use clap::{Parser, Subcommand};

use diffsync::commands;
use diffsync::error;
use diffsync::telemetry;

#[derive(Parser)]
#[command(name = "diffsync", about = "Replay remote commit diffs onto a local file mirror")]
struct Cli {
    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long = "log-json", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a mirror in the current directory
    Init {
        /// Repository owner on the remote
        #[arg(long)]
        owner: String,
        /// Repository name on the remote
        #[arg(long)]
        repo: String,
        /// Commit the mirror currently reflects
        #[arg(long)]
        checkpoint: String,
        /// API base URL
        #[arg(long = "api-url")]
        api_url: Option<String>,
        /// Environment variable holding the access token
        #[arg(long = "token-env")]
        token_env: Option<String>,
        /// Remote paths are stored unencoded
        #[arg(long = "plain-paths")]
        plain_paths: bool,
    },

    /// Show mirror configuration and checkpoint
    Status,

    /// List commits not yet replayed
    Log {
        /// Start from this commit instead of the checkpoint
        #[arg(long)]
        since: Option<String>,
    },

    /// Replay remote commits up to the head
    Sync {
        /// Start from this commit instead of the checkpoint
        #[arg(long)]
        since: Option<String>,
    },

    /// Apply a unified diff file to the mirror
    Apply {
        /// Path to the diff file
        diff: PathBuf,
    },

    /// Daemon: poll the remote and sync
    Daemon {
        /// Polling interval in seconds
        #[arg(long, default_value = "60")]
        interval: u64,
    },

    /// Encode a path with the mirror's path codec
    Encode {
        path: String,
    },

    /// Decode a path with the mirror's path codec
    Decode {
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.verbose, cli.log_json);

    let result = match cli.command {
        Some(Commands::Init {
            owner,
            repo,
            checkpoint,
            api_url,
            token_env,
            plain_paths,
        }) => commands::init::run(&commands::init::InitOptions {
            owner: &owner,
            repo: &repo,
            checkpoint: &checkpoint,
            api_url: api_url.as_deref(),
            token_env: token_env.as_deref(),
            plain_paths,
        }),
        Some(Commands::Status) => commands::status::run(),
        Some(Commands::Log { since }) => commands::log::run(since.as_deref()),
        Some(Commands::Sync { since }) => commands::sync::run(since.as_deref()),
        Some(Commands::Apply { diff }) => commands::apply::run(&diff),
        Some(Commands::Daemon { interval }) => commands::daemon::run(interval),
        Some(Commands::Encode { path }) => commands::codec::encode(&path),
        Some(Commands::Decode { path }) => commands::codec::decode(&path),

        None => {
            // Smart default: show status if initialized, else hint at init
            match error::find_mirror_root() {
                Ok(_) => commands::status::run(),
                Err(_) => {
                    println!("No diffsync mirror found. Run `diffsync init` to get started.");
                    Ok(())
                }
            }
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
