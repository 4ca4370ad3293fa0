//! src/main.rs
//! ============================================================================
//! # Navigator: line-oriented browser for extracted package output
//!
//! `navigator <root>` opens a navigation session rooted at `<root>` and reads
//! commands from stdin. The session is restored on start when the saved one
//! has the same root, and saved again on exit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    signal,
};
use tracing::{info, warn};

use navigator_core::{
    AppError,
    config::Config,
    controller::{
        NavigationSession, OpenAction, SessionEvent, SessionObserver, UpOutcome, open_entry,
    },
    fs::{DirectoryLister, Listing},
    logging::init_logging_with_config,
    model::{SavedSession, SessionStore, SourceInfo, nav_state::absolutize},
    view::TerminalHost,
};

const HELP: &str = "commands: ls | cd <name> | up | open <name> | refresh | quit";

#[tokio::main]
async fn main() -> Result<()> {
    let root: PathBuf = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => bail!("usage: navigator <root>"),
    };

    let config: Config = Config::load().await.unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        Config::default()
    });

    let _guard = init_logging_with_config(config.logging.clone())
        .await
        .context("Failed to initialize logging")?;

    info!(root = %root.display(), "Starting navigator");

    let store: SessionStore = SessionStore::new(
        config
            .session_path()
            .context("Failed to resolve session path")?,
    );

    let mut session: NavigationSession = open_session(&root, &config, &store).await?;
    let mut host: TerminalHost = TerminalHost::new(&config.viewer);

    run(&mut session, &mut host).await?;

    store
        .save(&session.save())
        .await
        .context("Failed to save session")?;
    session.dispose();

    info!("Navigator exited cleanly");
    Ok(())
}

async fn open_session(
    root: &Path,
    config: &Config,
    store: &SessionStore,
) -> Result<NavigationSession> {
    let root: PathBuf = absolutize(root)?;
    let lister: DirectoryLister = DirectoryLister::local(config.listing.clone());
    let package: String = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let saved: Option<SavedSession> = match store.load().await {
        Ok(saved) => saved.filter(|s: &SavedSession| -> bool { s.root_dir == root }),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable saved session");
            None
        }
    };

    let mut session: NavigationSession = match saved {
        Some(saved) => NavigationSession::restore(
            saved,
            lister,
            Box::new(TerminalObserver),
            config.persistence.max_listing_age,
        )?,
        None => NavigationSession::start(&root, lister, Box::new(TerminalObserver))?
            .with_source(SourceInfo::new(&package)),
    };

    settle(&mut session).await;

    Ok(session)
}

async fn run(session: &mut NavigationSession, host: &mut TerminalHost) -> Result<()> {
    println!("{HELP}");

    let mut lines: Lines<BufReader<Stdin>> = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line: String = tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C signal");
                break;
            }

            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) => line,
                None => break,
            },
        };

        let (command, arg) = match line.trim().split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line.trim(), ""),
        };

        match command {
            "" => {}

            "ls" => print_listing(session.listing()),

            "cd" => match session.navigate_to(arg) {
                Ok(()) => settle(session).await,
                Err(e) => println!("{e}"),
            },

            "up" => match session.navigate_up()? {
                UpOutcome::Exit => break,
                UpOutcome::Navigating(_) => settle(session).await,
            },

            "open" => {
                let Some(entry) = session.listing().find(arg).cloned() else {
                    println!("no entry named '{arg}'");
                    continue;
                };

                match open_entry(session, &entry, host).await {
                    Ok(OpenAction::Navigate(_)) => settle(session).await,
                    Ok(_) => {}
                    Err(AppError::UnsupportedFileType { .. }) => {
                        println!("No application can open {}", entry.display_name);
                    }
                    Err(e) => println!("{e}"),
                }
            }

            "refresh" => {
                session.refresh();
                settle(session).await;
            }

            "quit" | "exit" => break,

            _ => println!("{HELP}"),
        }
    }

    Ok(())
}

/// Wait for the in-flight listing; the observer does the printing.
async fn settle(session: &mut NavigationSession) {
    if let Some(SessionEvent::Failed { directory, .. }) = session.next_event().await {
        warn!(directory = %directory.display(), "Navigation failed");
    }
}

fn print_listing(listing: &Listing) {
    println!("== {} ==", listing.title());

    if listing.is_empty() {
        println!("  (empty)");
        return;
    }

    for entry in listing {
        let suffix: &str = if entry.is_dir { "/" } else { "" };
        println!("  {}{suffix}", entry.display_name);
    }
}

struct TerminalObserver;

impl SessionObserver for TerminalObserver {
    fn on_listing(&mut self, listing: &Listing) {
        print_listing(listing);
    }

    fn on_error(&mut self, current_dir: &Path, error: &AppError) {
        println!("{error} (staying in {})", current_dir.display());
    }
}
