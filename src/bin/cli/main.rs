mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kioku-cli", about = "Flashcard decks with spaced repetition review", version)]
struct Cli {
    /// User whose decks to work with
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// The user's plan includes cloud sync
    #[arg(long, global = true)]
    entitled: bool,

    /// Config file (default: <config_dir>/kioku/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List decks with their statistics
    Decks,

    /// Create an empty deck
    CreateDeck {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },

    /// Add a card to a deck
    Add {
        /// Deck name (case-insensitive prefix match) or id
        deck: String,
        front: String,
        back: String,
        #[arg(long)]
        hint: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Show the cards due for review
    Due {
        /// Only this deck
        #[arg(long)]
        deck: Option<String>,
        /// Maximum cards per deck
        #[arg(long)]
        per_deck: Option<usize>,
        /// Maximum cards overall
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record one answer for a card
    Review {
        /// Deck name or id
        deck: String,
        /// Card id
        card: String,
        /// again, hard, good, easy (or 1-4)
        outcome: String,
        /// How long the answer took
        #[arg(long, default_value = "0")]
        response_ms: u64,
    },

    /// Study due cards interactively
    Session {
        /// Only this deck
        #[arg(long)]
        deck: Option<String>,
        /// Maximum cards overall
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Create a deck from a CSV, TSV or JSON file
    Import {
        file: PathBuf,
        /// Deck name (default: name in the file, or the file name)
        #[arg(long)]
        name: Option<String>,
        /// csv, tsv or json (default: from the file extension)
        #[arg(long = "as")]
        file_format: Option<String>,
    },

    /// Write a deck's cards as CSV, TSV or JSON
    Export {
        deck: String,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// csv, tsv or json (default: from the output extension, else csv)
        #[arg(long = "as")]
        file_format: Option<String>,
    },

    /// Create a deck from a word or sentence list (JSON)
    ImportList { file: PathBuf },

    /// Push queued changes to the sync server
    Sync,

    /// Refresh from the sync server and show what happened, plus queued writes
    Events,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let app = app::App::new(cli.config.as_deref(), cli.user.clone(), cli.entitled)?;

    match cli.command {
        Command::Decks => {
            commands::decks::run_list(&app, &cli.format, use_color).await?;
        }
        Command::CreateDeck { name, description, color } => {
            commands::decks::run_create(&app, name, description, color, &cli.format).await?;
        }
        Command::Add { deck, front, back, hint, tags } => {
            commands::add::run(&app, &deck, front, back, hint, tags.as_deref(), &cli.format).await?;
        }
        Command::Due { deck, per_deck, limit } => {
            let limits = app.due_limits(per_deck, limit);
            commands::due::run(&app, deck.as_deref(), limits, &cli.format, use_color).await?;
        }
        Command::Review { deck, card, outcome, response_ms } => {
            commands::review::run_single(&app, &deck, &card, &outcome, response_ms, &cli.format).await?;
        }
        Command::Session { deck, limit } => {
            let limits = app.due_limits(None, limit);
            commands::review::run_session(&app, deck.as_deref(), limits, use_color).await?;
        }
        Command::Import { file, name, file_format } => {
            commands::transfer::run_import(&app, &file, name, file_format.as_deref(), &cli.format).await?;
        }
        Command::Export { deck, output, file_format } => {
            commands::transfer::run_export(&app, &deck, output.as_deref(), file_format.as_deref()).await?;
        }
        Command::ImportList { file } => {
            commands::transfer::run_import_list(&app, &file, &cli.format).await?;
        }
        Command::Sync => {
            commands::sync::run_sync(&app, &cli.format).await?;
        }
        Command::Events => {
            commands::sync::run_events(&app, &cli.format).await?;
        }
    }

    Ok(())
}
