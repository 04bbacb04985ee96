//! `carousel`: generate carousel slides from the terminal and browse past runs.

mod config;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use carousel_core::{GenerationMode, GenerationRequest, HistoryEntry};
use carousel_engine::{
    download_slides, load_dark_mode, save_dark_mode, GenerationClient, Generator, HistoryStore,
    SharedSession,
};
use carousel_logging::{carousel_info, carousel_warn};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::AppConfig;
use crate::render::{entry_details, history_listing, TerminalSink};

/// Generate carousel slides and manage the local history.
#[derive(Parser, Debug)]
#[command(name = "carousel", version, about, long_about = None)]
struct Cli {
    /// Configuration file (RON). Defaults to ./carousel.ron when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a generation request and wait for the slides.
    #[command(subcommand)]
    Generate(GenerateCommand),
    /// List past generations grouped by recency.
    History,
    /// Show one history entry.
    Show {
        /// Entry id as printed by `history`.
        id: i64,
    },
    /// Save the slides of a history entry as image files.
    Download {
        id: i64,
        /// Output directory. Defaults to ./carousel-<job id>.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete all history entries.
    ClearHistory,
    /// Print or set the display theme preference.
    Theme { theme: Option<Theme> },
}

#[derive(Subcommand, Debug)]
enum GenerateCommand {
    /// Expand a short idea into a carousel.
    Idea {
        #[command(flatten)]
        common: GenerateArgs,
        /// Tone of voice for the copy.
        #[arg(long)]
        tone: Option<String>,
    },
    /// Turn a finished script into a carousel.
    Script {
        #[command(flatten)]
        common: GenerateArgs,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    creator: Option<String>,
    #[arg(long, default_value = "default")]
    template: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Theme {
    Dark,
    Light,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    carousel_logging::initialize(config.log.destination(), config.log.level()?);

    match cli.command {
        Commands::Generate(command) => generate(&config, command).await,
        Commands::History => {
            let history = open_history(&config);
            print!("{}", history_listing(&history.grouped(&Local::now())));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { id } => {
            let history = open_history(&config);
            let entry = find_entry(&history, id)?;
            print!("{}", entry_details(entry));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Download { id, out } => download(&config, id, out).await,
        Commands::ClearHistory => {
            let mut history = open_history(&config);
            history.clear().context("clearing history")?;
            println!("History cleared.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Theme { theme } => {
            let mut store = config.file_store();
            match theme {
                Some(theme) => {
                    save_dark_mode(&mut store, theme == Theme::Dark)
                        .context("saving theme preference")?;
                    println!("Theme set to {}.", theme_name(theme == Theme::Dark));
                }
                None => {
                    let dark = load_dark_mode(&store).unwrap_or(false);
                    println!("{}", theme_name(dark));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn generate(config: &AppConfig, command: GenerateCommand) -> anyhow::Result<ExitCode> {
    let (mode, args, tone) = match command {
        GenerateCommand::Idea { common, tone } => (GenerationMode::Idea, common, tone),
        GenerateCommand::Script { common } => (GenerationMode::Script, common, None),
    };
    let mut request = GenerationRequest::new(args.prompt, args.template)?
        .with_creator_name(args.creator.unwrap_or_default());
    if let Some(tone) = tone {
        request = request.with_tone_of_voice(tone);
    }

    let client = GenerationClient::new(config.client_settings())?;
    let history = Arc::new(Mutex::new(open_history(config)));
    let session = SharedSession::new();
    let generator = Generator::new(
        client,
        config.endpoints(),
        session.clone(),
        history,
        config.poll_settings(),
    );

    let sink = TerminalSink;
    tokio::select! {
        result = generator.generate(request, mode, &sink) => match result? {
            Some(outcome) if outcome.is_success() => Ok(ExitCode::SUCCESS),
            _ => Ok(ExitCode::FAILURE),
        },
        _ = tokio::signal::ctrl_c() => {
            if let Some(stopped) = session.stop_generation() {
                carousel_info!("Interrupted while polling job {}", stopped.job);
            }
            println!("Generation stopped.");
            Ok(ExitCode::from(130))
        }
    }
}

async fn download(config: &AppConfig, id: i64, out: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let history = open_history(config);
    let entry = find_entry(&history, id)?;
    let dir = out.unwrap_or_else(|| PathBuf::from(format!("./carousel-{}", entry.job_id)));

    let client = GenerationClient::new(config.client_settings())?;
    let report = download_slides(&client, &entry.slides, &dir).await?;
    println!(
        "Saved {} of {} slides to {}",
        report.saved.len(),
        entry.slides.len(),
        dir.display()
    );
    for (index, err) in &report.failed {
        println!("  slide {} failed: {}", index + 1, err);
    }
    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn open_history(config: &AppConfig) -> HistoryStore {
    HistoryStore::load(Box::new(config.file_store()), config.history_settings())
}

fn find_entry(history: &HistoryStore, id: i64) -> anyhow::Result<&HistoryEntry> {
    match history.find(id) {
        Some(entry) => Ok(entry),
        None => {
            carousel_warn!("History entry {} not found", id);
            bail!("no history entry with id {id}")
        }
    }
}

fn theme_name(dark: bool) -> &'static str {
    if dark {
        "dark"
    } else {
        "light"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_generate_idea() {
        let cli = Cli::try_parse_from([
            "carousel",
            "generate",
            "idea",
            "--prompt",
            "remote work tips",
            "--tone",
            "casual",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate(GenerateCommand::Idea { common, tone }) => {
                assert_eq!(common.prompt, "remote work tips");
                assert_eq!(common.template, "default");
                assert_eq!(tone.as_deref(), Some("casual"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn script_mode_has_no_tone_flag() {
        let result = Cli::try_parse_from([
            "carousel", "generate", "script", "--prompt", "x", "--tone", "casual",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn theme_and_download_arguments() {
        let cli = Cli::try_parse_from(["carousel", "--config", "c.ron", "theme", "dark"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.ron")));
        assert!(matches!(cli.command, Commands::Theme { theme: Some(Theme::Dark) }));

        let cli = Cli::try_parse_from(["carousel", "download", "42", "--out", "slides"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Download { id: 42, out: Some(_) }
        ));
    }
}
