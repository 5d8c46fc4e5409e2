mod commands;
mod config;
mod render;

use std::{io::Write as _, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    CredentialSlot, HttpAuthority, HttpCatalog, QueryController, QueryView, RequestDispatcher,
    SessionManager, SessionPhase,
};
use storage::{MemoryStore, SessionStore, Storage};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::watch,
};
use tracing::{info, warn};

use crate::{
    commands::{Command, HELP},
    config::Settings,
};

#[derive(Parser, Debug)]
#[command(about = "Browse the creature catalog from a terminal")]
struct Args {
    /// Base url of the catalog and auth service.
    #[arg(long)]
    server_url: Option<String>,
    /// Where the login session is kept between runs.
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    debounce_ms: Option<u64>,
    #[arg(long)]
    log_filter: Option<String>,
    /// Keep the session in memory only.
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = config::load_settings();
    if let Some(v) = args.server_url {
        settings.server_url = v;
    }
    if let Some(v) = args.database_url {
        settings.database_url = v;
    }
    if let Some(v) = args.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = args.log_filter {
        settings.log_filter = v;
    }

    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let store = open_store(&settings, args.ephemeral).await;
    let credential = CredentialSlot::new();
    let dispatcher = RequestDispatcher::new(&settings.server_url, credential.clone())
        .with_context(|| format!("invalid server url '{}'", settings.server_url))?;
    let session = SessionManager::new(
        store,
        Arc::new(HttpAuthority::new(dispatcher.clone())),
        credential,
    );
    let queries =
        QueryController::with_debounce(Arc::new(HttpCatalog::new(dispatcher)), settings.debounce());
    info!(server_url = %settings.server_url, "terminal starting");

    println!("{}", render::session_line(&session.snapshot()));
    if session.bootstrap().await == SessionPhase::Authenticated {
        queries.refresh().await;
    }
    println!("{}", render::session_line(&session.snapshot()));

    let renderer = tokio::spawn(draw_results(queries.subscribe()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt("> ");
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if command.needs_session() && session.phase() != SessionPhase::Authenticated {
            println!("{}", render::session_line(&session.snapshot()));
            continue;
        }
        run_command(command, &session, &queries, &mut lines).await?;
    }

    renderer.abort();
    Ok(())
}

async fn open_store(settings: &Settings, ephemeral: bool) -> Arc<dyn SessionStore> {
    if ephemeral {
        return Arc::new(MemoryStore::new());
    }
    let database_url = config::normalize_database_url(&settings.database_url);
    match Storage::new(&database_url).await {
        Ok(storage) => Arc::new(storage),
        Err(err) => {
            warn!(%database_url, error = %err, "session database unavailable, session will not survive restart");
            Arc::new(MemoryStore::new())
        }
    }
}

async fn run_command(
    command: Command,
    session: &Arc<SessionManager>,
    queries: &Arc<QueryController>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => {
                    prompt("password: ");
                    lines
                        .next_line()
                        .await
                        .context("failed to read password")?
                        .unwrap_or_default()
                }
            };
            match session.login(&username, &password).await {
                Ok(_) => {
                    println!("{}", render::session_line(&session.snapshot()));
                    queries.refresh().await;
                }
                Err(err) => println!("Login failed: {}", err.user_message()),
            }
        }
        Command::Logout => {
            session.logout().await;
            println!("{}", render::session_line(&session.snapshot()));
        }
        Command::Whoami => println!("{}", render::session_line(&session.snapshot())),
        Command::Search(text) => queries.set_raw_search_text(text).await,
        Command::Sort(mode) => queries.set_sort_mode(mode).await,
        Command::Page(page) => queries.set_page(page).await,
        Command::Next => queries.next_page().await,
        Command::Prev => queries.prev_page().await,
        Command::Retry => queries.retry().await,
        Command::Show(id) => match queries.detail(id).await {
            Ok(detail) => println!("{}", render::detail_screen(&detail)),
            Err(err) => println!("Error: {}", err.user_message()),
        },
        Command::View => println!("{}", render::results_screen(&queries.snapshot())),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

async fn draw_results(mut views: watch::Receiver<QueryView>) {
    let mut drawn = views.borrow_and_update().clone();
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        if render::should_redraw(&drawn, &view) {
            println!("{}", render::results_screen(&view));
            drawn = view;
        }
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}
