//! # huddle
//!
//! Study-group chat server binary. `serve` wires the store, verifier, and
//! broker together and runs the WebSocket server; the remaining subcommands
//! administer the database directly.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use huddle_core::{GroupId, MembershipStore, UserDirectory, UserId};
use huddle_server::{Broker, ChatContext, HuddleServer, JwtVerifier, issue_token};
use huddle_settings::HuddleSettings;
use huddle_store::SqliteStore;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Huddle study-group chat.
#[derive(Parser, Debug)]
#[command(name = "huddle", about = "Study-group chat server", version)]
struct Cli {
    /// Settings file (defaults to `~/.huddle/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the chat server until Ctrl-C.
    Serve {
        /// Host to bind.
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Register a user.
    AddUser {
        /// Unique display name.
        username: String,
    },

    /// Create a study group. The creator becomes its first member.
    CreateGroup {
        /// Group name.
        name: String,

        /// Creating user.
        #[arg(long)]
        creator: UserId,

        /// Free-text description.
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Add a user to a group.
    JoinGroup {
        /// Group to join.
        group: GroupId,

        /// Joining user.
        #[arg(long)]
        user: UserId,
    },

    /// List groups, newest first.
    ListGroups,

    /// Print a signed access token for a user.
    IssueToken {
        /// Token subject.
        user_id: UserId,

        /// Token lifetime in seconds.
        #[arg(long, default_value = "86400")]
        ttl_secs: u64,
    },
}

fn load_settings(cli: &Cli) -> Result<HuddleSettings> {
    let mut settings = match &cli.config {
        Some(path) => huddle_settings::load_settings_from_path(path),
        None => huddle_settings::load_settings(),
    }
    .context("Failed to load settings")?;

    if let Some(db) = &cli.db {
        settings.database.path = db.display().to_string();
    }
    if let Command::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = port {
            settings.server.port = *port;
        }
    }
    Ok(settings)
}

fn open_store(settings: &HuddleSettings) -> Result<Arc<SqliteStore>> {
    let path = settings.database.resolved_path();
    let store = SqliteStore::open(&settings.database)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn serve(settings: HuddleSettings) -> Result<()> {
    if settings.auth.jwt_secret.is_empty() {
        bail!("auth.jwtSecret is empty; set it in settings or HUDDLE_JWT_SECRET");
    }

    let metrics = match huddle_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed, /metrics disabled");
            None
        }
    };

    let store = open_store(&settings)?;
    let directory: Arc<dyn UserDirectory> = store.clone();
    let membership: Arc<dyn MembershipStore> = store;
    let chat = ChatContext {
        verifier: Arc::new(JwtVerifier::new(
            &settings.auth.jwt_secret,
            settings.auth.leeway_secs,
            directory,
        )),
        store: membership,
        broker: Arc::new(Broker::new(settings.broker.max_drops)),
    };

    let server = HuddleServer::new(&settings, chat, metrics);
    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    tracing::info!(
        %addr,
        db = %settings.database.resolved_path().display(),
        outbound_buffer = settings.broker.outbound_buffer,
        max_drops = settings.broker.max_drops,
        "huddle ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.shutdown().drain(handle, None).await {
        tracing::warn!("some chat sockets did not close cleanly");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    huddle_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    match cli.command {
        Command::Serve { .. } => serve(settings).await?,
        Command::AddUser { username } => {
            let user = open_store(&settings)?
                .create_user(&username)
                .await
                .with_context(|| format!("Failed to add user {username}"))?;
            println!("{}\t{}", user.id, user.username);
        }
        Command::CreateGroup {
            name,
            creator,
            description,
        } => {
            let group = open_store(&settings)?
                .create_group(&name, &description, creator)
                .await
                .with_context(|| format!("Failed to create group {name}"))?;
            println!("{}\t{}", group.id, group.name);
        }
        Command::JoinGroup { group, user } => {
            open_store(&settings)?
                .join_group(group, user)
                .await
                .with_context(|| format!("Failed to add user {user} to group {group}"))?;
            println!("user {user} joined group {group}");
        }
        Command::ListGroups => {
            for group in open_store(&settings)?.list_groups().await? {
                println!(
                    "{}\t{}\t{} members\t{}",
                    group.id,
                    group.name,
                    group.member_ids.len(),
                    group.description
                );
            }
        }
        Command::IssueToken { user_id, ttl_secs } => {
            if settings.auth.jwt_secret.is_empty() {
                bail!("auth.jwtSecret is empty; cannot sign tokens");
            }
            let token = issue_token(
                &settings.auth.jwt_secret,
                user_id,
                Duration::from_secs(ttl_secs),
            )
            .context("Failed to sign token")?;
            println!("{token}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("huddle").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("settings.json");
        std::fs::write(
            &config,
            r#"{ "server": { "host": "0.0.0.0", "port": 9000 }, "auth": { "jwtSecret": "s" } }"#,
        )
        .unwrap();
        let db = dir.path().join("chat.db");

        let cli = parse(&[
            "serve",
            "--port",
            "9100",
            "--config",
            config.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
        ]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.auth.jwt_secret, "s");
        assert_eq!(settings.database.path, db.display().to_string());
    }

    #[test]
    fn admin_subcommands_parse_typed_ids() {
        let cli = parse(&["create-group", "Algorithms", "--creator", "3"]);
        match cli.command {
            Command::CreateGroup {
                name,
                creator,
                description,
            } => {
                assert_eq!(name, "Algorithms");
                assert_eq!(creator, UserId(3));
                assert!(description.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = parse(&["join-group", "7", "--user", "2"]);
        assert!(matches!(
            cli.command,
            Command::JoinGroup { group: GroupId(7), user: UserId(2) }
        ));

        assert!(Cli::try_parse_from(["huddle", "join-group", "x", "--user", "2"]).is_err());
    }

    #[tokio::test]
    async fn serve_refuses_empty_secret() {
        let mut settings = HuddleSettings::default();
        settings.auth.jwt_secret.clear();
        let err = serve(settings).await.unwrap_err();
        assert!(err.to_string().contains("jwtSecret"));
    }
}
