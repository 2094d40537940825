//! BloodConnect CLI - Command-line client for BloodConnect Pro
//!
//! Drives the session manager against file-backed storage media and a JSON
//! user directory, so a session survives between invocations.

use anyhow::{Context, Result};
use bloodconnect_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success,
    BloodConnectConfig, BloodConnectError, BloodConnectResult, ErrorContext,
};
use bloodconnect_session::{
    evaluate, FileMedium, JsonFileDirectory, Role, RoleManager, RouteAccess, SessionError,
    SessionManager, SessionStorage, SignupProfile, TracingNavigator, UserDirectory,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "bloodconnect")]
#[command(about = "Session client for the BloodConnect Pro donor platform")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Session(SessionCommand),

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Validate configuration
        #[arg(long)]
        validate: bool,
    },
}

/// Commands that run against a restored session
#[derive(Subcommand)]
enum SessionCommand {
    /// Log in with email and password
    Login {
        email: String,

        password: String,

        /// Keep the session after the browsing session ends
        #[arg(short, long)]
        remember: bool,
    },

    /// Register a new donor account and log in
    Signup {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        name: String,

        /// Extra profile attribute, e.g. --attr bloodGroup=O+
        #[arg(long = "attr", value_name = "KEY=VALUE", value_parser = parse_attribute)]
        attributes: Vec<(String, Value)>,
    },

    /// Log out and clear stored sessions
    Logout,

    /// Show the current identity
    Whoami,

    /// Refresh the current identity from the user directory
    Reload,

    /// Change a user's role (administrators only)
    SetRole { uid: String, role: Role },

    /// Show what a route guard decides for the current session
    Guard { access: RouteAccess },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    debug!("Starting BloodConnect CLI v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Session(command) => run_session_command(&config, command).await,
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(&config, show, init, validate),
    };

    result.map_err(report)
}

/// Log a failed command and print its recovery hints
fn report(error: BloodConnectError) -> anyhow::Error {
    error.log();
    for suggestion in error.suggestions() {
        eprintln!("💡 {}", suggestion);
    }
    anyhow::Error::new(error)
}

async fn run_session_command(
    config: &BloodConnectConfig,
    command: SessionCommand,
) -> BloodConnectResult<()> {
    let directory: Arc<dyn UserDirectory> =
        Arc::new(JsonFileDirectory::open(config.users_path()).await?);
    let session = Arc::new(build_session(config, directory.clone()));

    session.initialize().await;

    match command {
        SessionCommand::Login {
            email,
            password,
            remember,
        } => handle_login(&session, &email, &password, remember).await,
        SessionCommand::Signup {
            email,
            password,
            name,
            attributes,
        } => {
            let profile = attributes.into_iter().fold(
                SignupProfile::new(email, password, name),
                |profile, (key, value)| profile.with_attribute(key, value),
            );
            handle_signup(&session, profile).await
        }
        SessionCommand::Logout => {
            session.logout();
            println!("👋 Logged out");
            Ok(())
        }
        SessionCommand::Whoami => print_identity(&session),
        SessionCommand::Reload => handle_reload(&session).await,
        SessionCommand::SetRole { uid, role } => {
            let roles = RoleManager::new(session.clone(), directory);
            handle_set_role(&roles, &uid, role).await
        }
        SessionCommand::Guard { access } => {
            let decision = evaluate(&session.snapshot(), access);
            println!("{}", serde_json::to_string(&decision)?.trim_matches('"'));
            Ok(())
        }
    }
}

fn load_config(config_path: Option<&PathBuf>) -> Result<BloodConnectConfig> {
    if let Some(path) = config_path {
        return BloodConnectConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("bloodconnect").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".bloodconnect").join("config.toml")),
        Some(PathBuf::from("bloodconnect.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return BloodConnectConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()));
        }
    }

    Ok(BloodConnectConfig::default())
}

fn build_session(config: &BloodConnectConfig, directory: Arc<dyn UserDirectory>) -> SessionManager {
    let storage = SessionStorage::new(
        Arc::new(FileMedium::new(config.persistent_path())),
        Arc::new(FileMedium::new(config.transient_path())),
        config.session.storage_key.clone(),
    );

    SessionManager::new(
        config.session.clone(),
        directory,
        storage,
        Arc::new(TracingNavigator),
    )
}

async fn handle_login(
    session: &SessionManager,
    email: &str,
    password: &str,
    remember: bool,
) -> BloodConnectResult<()> {
    log_operation_start!("login", remember = remember);

    match session.login(email, password, remember).await {
        Ok(identity) => {
            log_operation_success!("login", uid = %identity.uid);
            println!("✅ Logged in as {} <{}>", identity.name, identity.email);
            Ok(())
        }
        Err(e) => {
            log_operation_error!("login", e);
            Err(e.into())
        }
    }
}

async fn handle_signup(session: &SessionManager, profile: SignupProfile) -> BloodConnectResult<()> {
    log_operation_start!("signup");

    let identity = session.signup(profile).await.map_err(|e| {
        log_operation_error!("signup", e);
        e
    })?;

    log_operation_success!("signup", uid = %identity.uid);
    println!("✅ Account created for {} (uid {})", identity.name, identity.uid);
    Ok(())
}

async fn handle_reload(session: &SessionManager) -> BloodConnectResult<()> {
    if session.current_identity().is_none() {
        println!("Not logged in");
        return Ok(());
    }

    match session.reload_user().await {
        Ok(Some(identity)) => {
            println!("🔄 Reloaded {} ({})", identity.name, identity.role);
            Ok(())
        }
        Ok(None) => {
            println!("Account no longer exists; logged out");
            Ok(())
        }
        Err(e @ SessionError::CollaboratorUnavailable { .. }) => {
            println!("⚠️  Directory unreachable; keeping the cached session");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_set_role(roles: &RoleManager, uid: &str, role: Role) -> BloodConnectResult<()> {
    let update = roles.update_role(uid, role).await?;
    if !update.success {
        return Err(BloodConnectError::Validation {
            message: update.message,
            context: ErrorContext::new("cli")
                .with_operation("set_role")
                .with_suggestion("Check the user id"),
        });
    }

    info!(target_uid = %uid, role = %role, "Role changed from CLI");
    println!("✅ {}", update.message);
    Ok(())
}

fn print_identity(session: &SessionManager) -> BloodConnectResult<()> {
    match session.current_identity() {
        Some(identity) => println!("{}", serde_json::to_string_pretty(&identity)?),
        None => println!("Not logged in"),
    }
    Ok(())
}

fn handle_config(
    config: &BloodConnectConfig,
    show: bool,
    init: bool,
    validate: bool,
) -> BloodConnectResult<()> {
    if init {
        let config_path = default_config_path()?;
        BloodConnectConfig::default().save_to_file(&config_path)?;
        println!("✅ Configuration initialized at: {}", config_path.display());
    }

    if show {
        let rendered = toml::to_string_pretty(config).map_err(|e| BloodConnectError::Config {
            message: format!("Failed to render configuration: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("cli").with_operation("config_show"),
        })?;
        println!("📋 Current configuration:");
        println!("{}", rendered);
    }

    if validate {
        config.validate()?;
        println!("✅ Configuration is valid");
    }

    Ok(())
}

fn default_config_path() -> BloodConnectResult<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .map(|dir| dir.join("bloodconnect").join("config.toml"))
        .ok_or_else(|| BloodConnectError::Config {
            message: "Could not determine a configuration directory".to_string(),
            source: None,
            context: ErrorContext::new("cli")
                .with_operation("config_init")
                .with_suggestion("Pass --config with an explicit path"),
        })
}

/// Parse `key=value`; values that read as JSON keep their type
fn parse_attribute(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err("attribute key must not be empty".to_string());
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
