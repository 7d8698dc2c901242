use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use futures::future::join_all;
use tokio::sync::{mpsc, watch};

use linkboard::config::{AppConfig, ConfigError};
use linkboard::connector::{ConnectOutcome, ProviderConnector};
use linkboard::display::ConnectionDisplay;
use linkboard::logging::{init_logging, LoggingConfig};
use linkboard::notification::{Notification, NotificationRenderer};
use linkboard::provider::{HttpBackend, IntegrationBackend, ProviderKind};
use linkboard::registry::IntegrationRegistry;
use linkboard::session::SessionController;
use linkboard::shell::{ApplicationShell, ShellEvent};
use linkboard::store::FileStore;
use linkboard::window::TerminalWindowOpener;

/// Identity used when none is configured.
const DEFAULT_USER: &str = "TestUser";
const DEFAULT_ORG: &str = "TestOrg";

#[derive(Parser)]
#[command(name = "linkboard")]
#[command(version)]
#[command(about = "Connect HubSpot, Notion and Airtable accounts and browse their data")]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the credential store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true)]
    backend: Option<String>,

    /// User identifier
    #[arg(long, global = true)]
    user: Option<String>,

    /// Organization identifier
    #[arg(long, global = true)]
    org: Option<String>,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    /// Suppress all logs
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which providers are connected
    Status,

    /// Authorize one or more providers
    Connect {
        /// Providers to connect (hubspot, notion, airtable)
        #[arg(required = true)]
        providers: Vec<ProviderKind>,
    },

    /// Remove a provider's stored credentials
    Disconnect {
        /// Provider to disconnect
        provider: ProviderKind,
    },

    /// Load data from a connected provider
    Load {
        /// Provider to load from
        provider: ProviderKind,

        /// List Notion databases instead of loading items
        #[arg(long, conflicts_with = "database")]
        databases: bool,

        /// Load the items of one Notion database
        #[arg(long)]
        database: Option<String>,
    },

    /// Follow connection state until interrupted
    Watch,

    /// Return to the landing view, keeping stored connections
    Logout,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

/// Exit codes.
mod exit_codes {
    use std::process::ExitCode;

    /// The command completed
    pub fn success() -> ExitCode {
        ExitCode::SUCCESS
    }

    /// The operation failed (backend error, provider not connected, ...)
    pub fn failed() -> ExitCode {
        ExitCode::from(1)
    }

    /// Invalid configuration or input
    pub fn invalid() -> ExitCode {
        ExitCode::from(2)
    }
}

/// Everything a command needs.
struct Context {
    config: AppConfig,
    registry: Arc<IntegrationRegistry>,
    user: String,
    org: String,
    use_color: bool,
}

impl Context {
    fn renderer(&self) -> NotificationRenderer {
        NotificationRenderer::new().with_color(self.use_color)
    }

    fn display(&self) -> ConnectionDisplay {
        ConnectionDisplay::new().with_colors(self.use_color)
    }

    fn backend(&self) -> Result<HttpBackend, Box<dyn std::error::Error>> {
        Ok(HttpBackend::new(self.config.backend_config())?)
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }
    if let Some(backend) = &cli.backend {
        config.backend_url = backend.clone();
    }
    if cli.user.is_some() {
        config.user = cli.user.clone();
    }
    if cli.org.is_some() {
        config.org = cli.org.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_context(cli: &Cli, config: AppConfig) -> Result<Context, Box<dyn std::error::Error>> {
    let store = FileStore::open(config.store_path())?;
    tracing::debug!(path = %store.path().display(), "Opened credential store");
    let registry = Arc::new(IntegrationRegistry::new(Arc::new(store)));

    let session = registry.session_state();
    let user = config
        .user
        .clone()
        .or(session.user)
        .unwrap_or_else(|| DEFAULT_USER.to_string());
    let org = config
        .org
        .clone()
        .or(session.org)
        .unwrap_or_else(|| DEFAULT_ORG.to_string());

    Ok(Context {
        config,
        registry,
        user,
        org,
        use_color: !cli.no_color && std::env::var("NO_COLOR").is_err(),
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let use_color = !cli.no_color && std::env::var("NO_COLOR").is_err();
    init_logging(LoggingConfig::from_verbosity(cli.verbose, cli.quiet).with_ansi(use_color));

    // The file may not exist yet, so init runs before loading it.
    if let Commands::Config {
        command: ConfigCommands::Init { force },
    } = &cli.command
    {
        return run_config_init(&cli, *force);
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(exit_codes::invalid());
        }
    };

    if let Commands::Config { .. } = &cli.command {
        print!("{}", config.to_toml()?);
        return Ok(exit_codes::success());
    }

    let ctx = build_context(&cli, config)?;

    match cli.command {
        Commands::Status => run_status(&ctx),
        Commands::Connect { providers } => run_connect(&ctx, providers).await,
        Commands::Disconnect { provider } => run_disconnect(&ctx, provider),
        Commands::Load {
            provider,
            databases,
            database,
        } => run_load(&ctx, provider, databases, database).await,
        Commands::Watch => run_watch(&ctx).await,
        Commands::Logout => run_logout(&ctx),
        Commands::Config { .. } => Ok(exit_codes::success()),
    }
}

fn run_config_init(cli: &Cli, force: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let Some(path) = cli.config.clone().or_else(AppConfig::default_path) else {
        eprintln!("Error: no config directory available; pass --config");
        return Ok(exit_codes::invalid());
    };
    if path.exists() && !force {
        eprintln!(
            "Error: {} already exists (use --force to overwrite)",
            path.display()
        );
        return Ok(exit_codes::invalid());
    }

    AppConfig::default().write_to(&path)?;
    println!("Wrote {}", path.display());
    Ok(exit_codes::success())
}

fn run_status(ctx: &Context) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut shell = ApplicationShell::new(ctx.registry.clone());
    let view = shell.mount();
    let current = ctx
        .registry
        .current_integration()
        .map(|record| record.provider_type);

    let display = ctx.display();
    print!("{}", display.render_status(shell.flags(), current.as_deref()));
    println!();
    println!("User: {}  Org: {}", ctx.user, ctx.org);
    println!("{}", display.render_view(view));
    Ok(exit_codes::success())
}

async fn run_connect(
    ctx: &Context,
    providers: Vec<ProviderKind>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut providers = providers;
    providers.sort();
    providers.dedup();

    let backend: Arc<dyn IntegrationBackend> = Arc::new(ctx.backend()?);
    let opener = Arc::new(TerminalWindowOpener::new());

    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (success_tx, success_rx) = mpsc::unbounded_channel();
    let (shell_tx, shell_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = watch::channel(false);

    let mut session = SessionController::new(ctx.registry.clone(), notify_tx)
        .with_success_delay(ctx.config.success_delay())
        .with_success_callback(Arc::new(move |kind| {
            let _ = success_tx.send(kind);
        }));
    session.set_identity(ctx.user.clone(), ctx.org.clone());
    // Connected providers are refused by their connector, so the
    // replace warning would be misleading for them.
    for kind in &providers {
        if !ctx.registry.is_integration_connected(kind.display_name()) {
            session.select_provider(Some(*kind));
        }
    }

    let mut shell =
        ApplicationShell::new(ctx.registry.clone()).with_interval(ctx.config.shell_interval());
    shell.mount();
    let shell_task = tokio::spawn(shell.run(shell_tx, success_rx, stop_rx));
    let printer = tokio::spawn(print_events(notify_rx, shell_rx, ctx.renderer(), ctx.display()));

    let connectors: Vec<ProviderConnector> = providers
        .iter()
        .map(|kind| {
            ProviderConnector::new(*kind, ctx.registry.clone(), backend.clone(), opener.clone())
                .with_poll_interval(ctx.config.poll_interval())
                .with_events(event_tx.clone())
        })
        .collect();
    drop(event_tx);

    let session_task = tokio::spawn(session.run(event_rx));
    let results = join_all(
        connectors
            .iter()
            .map(|connector| connector.connect(&ctx.user, &ctx.org)),
    )
    .await;
    drop(connectors);
    let session = session_task.await?;

    let mut failed = false;
    let mut connected = false;
    for (kind, result) in providers.iter().zip(results) {
        match result {
            Ok(ConnectOutcome::Connected(_)) => connected = true,
            Ok(ConnectOutcome::AlreadyConnected) => {
                println!("{} is already connected; disconnect it first to reconnect.", kind);
            }
            Ok(ConnectOutcome::NotAuthorized) => {
                println!("{} was not authorized.", kind);
            }
            Ok(ConnectOutcome::Cancelled) => {
                println!("{} authorization was cancelled.", kind);
            }
            Err(e) => {
                failed = true;
                session.report_failure(*kind, &e);
            }
        }
    }
    drop(session);

    // Give the delayed success callbacks time to promote the shell.
    if connected {
        tokio::time::sleep(ctx.config.success_delay()).await;
        tokio::task::yield_now().await;
    }
    let _ = stop_tx.send(true);
    shell_task.await?;
    printer.await?;

    if failed {
        Ok(exit_codes::failed())
    } else {
        Ok(exit_codes::success())
    }
}

/// Print notifications and shell changes until both channels close.
async fn print_events(
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    mut shell_events: mpsc::UnboundedReceiver<ShellEvent>,
    renderer: NotificationRenderer,
    display: ConnectionDisplay,
) {
    let mut notifications_open = true;
    let mut shell_open = true;
    while notifications_open || shell_open {
        tokio::select! {
            notification = notifications.recv(), if notifications_open => match notification {
                Some(notification) => println!("{}", renderer.render(&notification)),
                None => notifications_open = false,
            },
            event = shell_events.recv(), if shell_open => match event {
                Some(ShellEvent::ViewChanged(view)) => println!("{}", display.render_view(view)),
                Some(ShellEvent::FlagsChanged(flags)) => {
                    print!("{}", display.render_status(&flags, None))
                }
                None => shell_open = false,
            },
        }
    }
}

fn run_disconnect(ctx: &Context, kind: ProviderKind) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if !ctx.registry.is_integration_connected(kind.display_name()) {
        eprintln!("{} is not connected.", kind);
        return Ok(exit_codes::failed());
    }

    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let mut session = SessionController::new(ctx.registry.clone(), notify_tx);
    let removed = session.disconnect_provider(kind);

    let renderer = ctx.renderer();
    while let Ok(notification) = notify_rx.try_recv() {
        println!("{}", renderer.render(&notification));
    }

    if removed {
        Ok(exit_codes::success())
    } else {
        eprintln!("Could not remove {} credentials.", kind);
        Ok(exit_codes::failed())
    }
}

async fn run_load(
    ctx: &Context,
    kind: ProviderKind,
    databases: bool,
    database: Option<String>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if (databases || database.is_some()) && kind != ProviderKind::Notion {
        eprintln!("Error: --databases and --database only apply to Notion");
        return Ok(exit_codes::invalid());
    }

    let Some(credentials) = ctx.registry.get_integration_credentials(kind.display_name()) else {
        eprintln!("{} is not connected. Run `linkboard connect {}` first.", kind, kind.slug());
        return Ok(exit_codes::failed());
    };

    let backend = ctx.backend()?;
    let result = match (databases, database) {
        (true, _) => backend.notion_databases(&credentials).await,
        (false, Some(id)) => backend.notion_database_items(&credentials, &id).await,
        (false, None) => backend.load(kind, &credentials).await,
    };

    match result {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(exit_codes::success())
        }
        Err(e) => {
            eprintln!("Error loading {} data: {}", kind, e);
            Ok(exit_codes::failed())
        }
    }
}

async fn run_watch(ctx: &Context) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut shell = ApplicationShell::new(ctx.registry.clone())
        .with_interval(ctx.config.shell_interval())
        .with_landing_poll(true);
    let view = shell.mount();

    let display = ctx.display();
    print!("{}", display.render_status(shell.flags(), None));
    println!("{}", display.render_view(view));

    let (shell_tx, shell_rx) = mpsc::unbounded_channel();
    let (_success_tx, success_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = watch::channel(false);
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();

    let shell_task = tokio::spawn(shell.run(shell_tx, success_rx, stop_rx));
    let printer = tokio::spawn(print_events(notify_rx, shell_rx, ctx.renderer(), display));

    tokio::signal::ctrl_c().await?;
    let _ = stop_tx.send(true);
    shell_task.await?;
    drop(notify_tx);
    printer.await?;
    Ok(exit_codes::success())
}

fn run_logout(ctx: &Context) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut shell = ApplicationShell::new(ctx.registry.clone());
    shell.mount();
    let view = shell.logout();

    println!("Logged out. Stored connections are kept.");
    println!("{}", ctx.display().render_view(view));
    Ok(exit_codes::success())
}
