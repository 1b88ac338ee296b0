//! `notesync` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, load configuration and start logging.
//! - Dispatch to the core service and report outcomes on stdout/stderr.

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::error;
use notesync_core::{
    default_log_level, init_logging, ComposeOptions, CreateOutcome, DateRange, ExternalEditor,
    SelectQuery, Selection, SessionEvent, SyncConfig, SyncService, TailQuery, DEFAULT_CONFIG_FILE,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "notesync", version, about = "Search, batch-edit and sync plain-text notes.")]
struct Cli {
    /// Config file (TOML).
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Overrides the configured log level.
    #[arg(long, env = "NOTESYNC_LOG")]
    log_level: Option<String>,

    /// Program used to view read-only results, e.g. "less -R".
    #[arg(long, global = true)]
    viewer: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search notes and open them as one document.
    View {
        /// Pattern to search for; every note when omitted.
        pattern: Option<String>,
        /// Search only in tags.
        #[arg(short = 't')]
        tags_only: bool,
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Open notes last modified inside a time range.
    Date {
        /// Start of the range, exclusive (`now`, `@<seconds>`, `YYYY-MM-DD[ HH:MM[:SS]]`).
        #[arg(long = "from", default_value = "@0")]
        from: String,
        /// End of the range, inclusive.
        #[arg(long = "to", default_value = "now")]
        to: String,
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Open the most recently modified notes.
    Tail {
        /// Rank of the last note shown, counting back from the newest (1).
        #[arg(default_value_t = 1)]
        final_index: usize,
        /// Number of notes ending at FINAL_INDEX; 0 shows all of them.
        #[arg(default_value_t = 0)]
        count: usize,
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Create a new note.
    New {
        /// Name of the note; defaults to the tags joined by `_`.
        #[arg(long)]
        name: Option<String>,
        /// Tags stored on the note.
        tags: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct DisplayArgs {
    /// Show tags.
    #[arg(short = 's')]
    show_tags: bool,
    /// Enable editing and write edits back.
    #[arg(short = 'e')]
    edit: bool,
    /// Hide dates.
    #[arg(long = "hd")]
    hide_dates: bool,
}

impl DisplayArgs {
    fn options(&self) -> ComposeOptions {
        ComposeOptions {
            show_date: !self.hide_dates,
            show_tags: self.show_tags,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={}", err);
            eprintln!("notesync: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    let mut config = SyncConfig::load_from(&cli.config)?.resolved_against(&cwd);
    if let Some(viewer) = cli.viewer.as_deref() {
        config = config.with_viewer(viewer)?;
    }

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_logging(&level, &config.log_dir) {
        eprintln!("notesync: logging disabled: {err}");
    }

    let service = SyncService::new(config);
    match cli.command {
        Command::View {
            pattern,
            tags_only,
            display,
        } => {
            let selection = Selection::Search(SelectQuery { pattern, tags_only });
            open_selection(&service, &selection, &display)?;
        }
        Command::Date { from, to, display } => {
            let range = DateRange::parse(&from, &to, Local::now())?;
            open_selection(&service, &Selection::Modified(range), &display)?;
        }
        Command::Tail {
            final_index,
            count,
            display,
        } => {
            let query = TailQuery { final_index, count };
            open_selection(&service, &Selection::Tail(query), &display)?;
        }
        Command::New { name, tags } => {
            let editor = ExternalEditor::new(service.config().editor.clone());
            match service.create(name.as_deref(), &tags, Local::now(), &editor)? {
                CreateOutcome::Saved(path) => println!("Saved {path}"),
                CreateOutcome::NotSaved(_) => println!("Note was empty; nothing saved."),
            }
        }
    }
    Ok(())
}

fn open_selection(
    service: &SyncService,
    selection: &Selection,
    display: &DisplayArgs,
) -> Result<(), Box<dyn Error>> {
    let paths = match service.select(selection) {
        Ok(paths) => paths,
        Err(err) if err.is_no_matches() => {
            println!("{err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    println!("Opening {} notes.", paths.len());

    if !display.edit {
        let viewer = ExternalEditor::new(service.config().viewer_command().to_vec());
        service.view(&paths, display.options(), &viewer)?;
        return Ok(());
    }

    let outcome = service.edit(&paths, display.options(), |event| match event {
        SessionEvent::Written(path) => println!("Writing to {path}"),
        SessionEvent::Deferred(path) => {
            eprintln!("notesync: {path} changed on disk; your edit will be merged on exit")
        }
        SessionEvent::Aborted(err) => eprintln!(
            "notesync: {err}\nnotesync: write-back stopped; nothing more will be saved from this document"
        ),
    })?;
    for path in outcome.merge.written.iter().chain(&outcome.merge.merged) {
        println!("Writing to {path}");
    }
    for path in &outcome.merge.skipped {
        println!("Merge abandoned, left unchanged: {path}");
    }
    Ok(())
}
