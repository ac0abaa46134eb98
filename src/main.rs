//! discord-session binary entry point.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use discord_session::auth::{
    shared_input, AuthController, BrowserLauncher, ConsoleBrowser, FileKeyValueStore,
    LoopbackBrowser, ProviderClient, SessionStore, SharedInput, UrlOpener,
};
use discord_session::config::AppConfig;
use discord_session::error::Result;
use discord_session::view::{describe_outcome, Command, Screen};

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        if let Some(help) = e.help() {
            eprintln!("  {help}");
        }
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::debug!(provider = ?config.provider, session_dir = %config.session_dir.display(), "loaded configuration");

    let input = shared_input(BufReader::new(tokio::io::stdin()));
    let opener = if config.open_browser {
        UrlOpener::System
    } else {
        UrlOpener::PrintOnly
    };
    let redirect_uri = &config.provider.redirect_uri;
    let launcher: Arc<dyn BrowserLauncher> = if LoopbackBrowser::supports(redirect_uri) {
        Arc::new(LoopbackBrowser::bind(redirect_uri).await?.with_opener(opener))
    } else {
        Arc::new(ConsoleBrowser::new(input.clone()).with_opener(opener))
    };

    let store = SessionStore::new(Arc::new(FileKeyValueStore::new(&config.session_dir)));
    let provider = ProviderClient::new(config.provider.clone())?;
    let mut auth = AuthController::new(provider, launcher, store);
    auth.restore_session().await;

    // Ctrl+C quits from the prompt and from a pending sign-in alike.
    tokio::select! {
        result = prompt(&mut auth, &input, &config.provider.cdn_base_url) => result,
        _ = interrupted() => {
            println!();
            Ok(())
        }
    }
}

async fn prompt(auth: &mut AuthController, input: &SharedInput, cdn_base_url: &str) -> Result<()> {
    loop {
        let screen = Screen::for_session(auth.session(), cdn_base_url);
        println!("\n{}", screen.render());
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = read_line(input).await? else {
            break;
        };
        let command = match Command::parse_line(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(unknown)) => {
                println!("Unknown command '{unknown}', type 'help' for the list");
                continue;
            }
        };
        let offered = screen.offers(command);
        drop(screen);
        if !offered {
            println!("'{command}' is not available right now");
            continue;
        }

        match command {
            Command::Login => {
                let outcome = auth.begin_login().await;
                println!("{}", describe_outcome(&outcome));
            }
            Command::Logout => {
                auth.logout().await;
                println!("👋 Signed out");
            }
            Command::Help => print_help(),
            Command::Quit => break,
        }
    }
    Ok(())
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Next line from the shared input; `None` at end of input.
async fn read_line(input: &SharedInput) -> Result<Option<String>> {
    let mut line = String::new();
    let read = input.lock().await.read_line(&mut line).await?;
    Ok((read > 0).then_some(line))
}

fn print_help() {
    println!("Commands:");
    println!("  login  (l)   sign in with Discord");
    println!("  logout (o)   forget the stored session");
    println!("  help   (h)   show this list");
    println!("  quit   (q)   exit");
}
