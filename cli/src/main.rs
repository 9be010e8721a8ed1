use clap::{Parser, Subcommand};

mod commands;
mod util;

use util::exit_error;

#[derive(Parser)]
#[command(
    name = "kokoro",
    version,
    about = "Kokoro Journal CLI — operator interface for diaries and the AI-commentary pipeline"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "KOKORO_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// User ID (temporary, will be replaced by auth)
    #[arg(long, env = "KOKORO_USER_ID")]
    user_id: Option<String>,

    /// Shared token for internal/admin endpoints
    #[arg(long, env = "KOKORO_INTERNAL_TOKEN")]
    internal_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Diary operations
    Diary {
        #[command(subcommand)]
        command: DiaryCommands,
    },
    /// Comment-delay setting
    Delay {
        #[command(subcommand)]
        command: DelayCommands,
    },
    /// Comment-job operations
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
}

#[derive(Subcommand)]
enum DiaryCommands {
    /// Create a diary entry
    New {
        /// Diary body text
        #[arg(long)]
        content: String,
        #[arg(long)]
        title: Option<String>,
        /// Short summary of what happened
        #[arg(long)]
        event_summary: Option<String>,
        /// What the writer took away from the day
        #[arg(long)]
        realization: Option<String>,
        /// Primary emotion label
        #[arg(long)]
        emotion: Option<String>,
        /// Mood label
        #[arg(long)]
        mood: Option<String>,
        /// Journal date (YYYY-MM-DD)
        #[arg(long)]
        journal_date: Option<String>,
    },
    /// Fetch a diary entry with its commentary state
    Show {
        entry_id: String,
    },
}

#[derive(Subcommand)]
enum DelayCommands {
    /// Read the configured comment delay
    Get,
    /// Update the comment delay (1, 10, 60 or 1440 minutes)
    Set {
        minutes: i64,
    },
}

#[derive(Subcommand)]
enum JobsCommands {
    /// Drain due comment jobs now
    Run {
        /// Batch size (default 3, max 10)
        #[arg(long)]
        limit: Option<i64>,
    },
}

fn require_user_id(user_id: Option<String>) -> String {
    user_id.unwrap_or_else(|| {
        exit_error(
            "user_id is required for diary operations",
            Some("Set --user-id or KOKORO_USER_ID env var"),
        )
    })
}

fn require_token(token: Option<String>) -> String {
    token.unwrap_or_else(|| {
        exit_error(
            "internal token is required for this operation",
            Some("Set --internal-token or KOKORO_INTERNAL_TOKEN env var"),
        )
    })
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Diary { command } => {
            let user_id = require_user_id(cli.user_id);
            match command {
                DiaryCommands::New {
                    content,
                    title,
                    event_summary,
                    realization,
                    emotion,
                    mood,
                    journal_date,
                } => {
                    commands::diary::new(
                        &cli.api_url,
                        &user_id,
                        &content,
                        title.as_deref(),
                        event_summary.as_deref(),
                        realization.as_deref(),
                        emotion.as_deref(),
                        mood.as_deref(),
                        journal_date.as_deref(),
                    )
                    .await
                }
                DiaryCommands::Show { entry_id } => {
                    commands::diary::show(&cli.api_url, &user_id, &entry_id).await
                }
            }
        }
        Commands::Delay { command } => {
            let token = require_token(cli.internal_token);
            match command {
                DelayCommands::Get => commands::delay::get(&cli.api_url, &token).await,
                DelayCommands::Set { minutes } => {
                    commands::delay::set(&cli.api_url, &token, minutes).await
                }
            }
        }
        Commands::Jobs { command } => {
            let token = require_token(cli.internal_token);
            match command {
                JobsCommands::Run { limit } => {
                    commands::jobs::run(&cli.api_url, &token, limit).await
                }
            }
        }
    };

    std::process::exit(code);
}
