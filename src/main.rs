//! CLI for Classlink
//!
//! Subcommands:
//! - `listen`: connect as a user and log notifications until Ctrl-C
//! - `comments`: print pages of a comment thread
//! - `session`: inspect, set or clear the stored session

use std::sync::Arc;

use clap::{Parser, Subcommand};
use classlink::Classlink;
use classlink::comments::ParentKey;
use classlink::config::{Settings, load_config};
use classlink::navigation::LogNavigator;
use classlink::notify::LogPresenter;
use classlink::persistence::UserProfile;
use classlink::realtime::Identity;
use classlink::utils::logging;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "classlink")]
enum Command {
    /// Connect to the realtime broker and show notifications
    Listen {
        /// Connect as this user instead of the stored session
        #[arg(long)]
        user_id: Option<i64>,
        /// Access token used with --user-id
        #[arg(long)]
        token: Option<String>,
    },
    /// Print pages of a comment thread
    Comments {
        /// Thread key, e.g. `assignment:37` or `comment:12`
        #[arg(long)]
        parent: String,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
        /// Page size (defaults to the configured one)
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Manage the stored session
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Print the stored profile
    Show,
    /// Store a session obtained from the auth service
    Set {
        #[arg(long)]
        token: String,
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        username: String,
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
    },
    /// Forget the stored session
    Clear,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            warn!("Failed to load configuration, using defaults: {}", e);
            Settings::default()
        }
    };
    logging::init(&settings.log.level);

    let client = match Classlink::new(settings, Arc::new(LogPresenter), Arc::new(LogNavigator)) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to start: {}", e);
            return;
        }
    };

    let result = match cmd {
        Command::Listen { user_id, token } => run_listen(&client, user_id, token).await,
        Command::Comments {
            parent,
            pages,
            page_size,
        } => run_comments(&client, &parent, pages, page_size).await,
        Command::Session(command) => run_session(&client, command),
    };
    if let Err(e) = result {
        error!("Command failed: {}", e);
    }
    client.shutdown();
}

async fn run_listen(
    client: &Classlink,
    user_id: Option<i64>,
    token: Option<String>,
) -> classlink::Result<()> {
    match user_id {
        Some(user_id) => {
            let mut identity = Identity::new(user_id);
            if let Some(token) = token {
                identity = identity.with_token(token);
            }
            client.connect_as(identity).await;
        }
        None => {
            if !client.start().await? {
                warn!("No stored session; pass --user-id or run `session set` first");
                return Ok(());
            }
        }
    }

    info!("Listening for notifications, press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for Ctrl-C: {}", e);
    }
    info!("Shutdown signal received. Disconnecting.");
    Ok(())
}

async fn run_comments(
    client: &Classlink,
    parent: &str,
    pages: usize,
    page_size: Option<usize>,
) -> classlink::Result<()> {
    let key: ParentKey = parent.parse()?;
    let page_size = page_size.unwrap_or(client.settings().comments.page_size);

    for _ in 0..pages {
        let page = client.comments().load_page(&key, page_size).await?;
        println!("-- page {} ({} comments)", page.index + 1, page.items.len());
        for comment in &page.items {
            println!(
                "#{} [{}] {}: {}",
                comment.id,
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.author.as_deref().unwrap_or("?"),
                comment.content
            );
        }
        if !page.has_more {
            break;
        }
    }

    Ok(())
}

fn run_session(client: &Classlink, command: SessionCommand) -> classlink::Result<()> {
    match command {
        SessionCommand::Show => match client.session().profile()? {
            Some(profile) => {
                let has_token = client.session().token()?.is_some();
                println!(
                    "user {} ({}) roles={:?} token={}",
                    profile.id,
                    profile.username,
                    profile.roles,
                    if has_token { "stored" } else { "missing" }
                );
            }
            None => println!("not signed in"),
        },
        SessionCommand::Set {
            token,
            user_id,
            username,
            roles,
        } => {
            let profile = UserProfile {
                id: user_id,
                username,
                roles,
            };
            client.sign_in(&token, &profile)?;
        }
        SessionCommand::Clear => {
            client.sign_out()?;
            println!("session cleared");
        }
    }
    Ok(())
}
