//! FileShell
//!
//! Command-line file manager for remote file-management HTTP services.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fileshell::config::{default_config_path, Config};
use fileshell::orchestrator::{FileOrchestrator, OperationEvent};
use fileshell::primitive::{HttpPrimitive, RemoteFilePrimitive};
use fileshell::repl::{parse_line, ShellCommand, HELP};
use fileshell::ProbeOutcome;
use protocol::DirEntry;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before prompting for a password.
const PASSWORD_ENV: &str = "FILESHELL_PASSWORD";

/// FileShell - file manager for remote HTTP file services.
#[derive(Parser, Debug)]
#[command(name = "fileshell")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Service URL (overrides the configuration file)
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// User to log in as
    #[arg(short, long, global = true, value_name = "USER")]
    pub user: Option<String>,

    /// Subcommand to execute (interactive shell when omitted)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List a directory
    Ls {
        /// Directory to list (working directory when omitted)
        path: Option<String>,
    },

    /// Download a file
    Get {
        /// Remote file name
        name: String,

        /// Local output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a local file
    Put {
        /// Local file to upload
        file: PathBuf,
    },

    /// Delete a file or directory
    Rm {
        /// Remote name
        name: String,
    },

    /// Copy a file
    Cp {
        /// Source name
        name: String,
        /// Destination name
        new_name: String,
    },

    /// Rename a file
    Mv {
        /// Current name
        old_name: String,
        /// New name
        new_name: String,
    },

    /// Create a directory
    Mkdir {
        /// Directory name (working directory when omitted)
        name: Option<String>,
    },

    /// Show the authenticated identity
    Whoami,

    /// Start the interactive shell
    Shell,

    /// Write the effective configuration to the configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable and flag overrides
    config.apply_env_overrides();
    if let Some(url) = &cli.url {
        config.server.url = url.clone();
    }
    if let Some(user) = &cli.user {
        config.auth.username = Some(user.clone());
    }

    // Initialize tracing
    let level = if cli.verbose {
        "debug"
    } else {
        config.log.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;

    if let Some(Commands::Init { force }) = &cli.command {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        return init_config(&config, &path, *force);
    }

    tracing::info!("Using service at {}", config.server.url);

    let primitive = Arc::new(HttpPrimitive::from_config(&config)?);
    let orchestrator = FileOrchestrator::new(primitive).starting_in(&config.server.root);
    spawn_event_logger(&orchestrator);

    // The anonymous probe learns the service's challenge before any login
    report_probe(&orchestrator.probe().await);
    if let Some(user) = config.auth.username.clone() {
        login(&orchestrator, &user).await?;
    }

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Ls { path } => {
            let entries = orchestrator.list(path.as_deref()).await?;
            print_listing(&entries);
        }
        Commands::Get { name, output } => {
            get(&orchestrator, &name, output.as_deref()).await?;
        }
        Commands::Put { file } => {
            let name = orchestrator.upload(&file).await?;
            println!("uploaded {name}");
        }
        Commands::Rm { name } => orchestrator.remove(&name).await?,
        Commands::Cp { name, new_name } => {
            orchestrator.copy(&name, Some(&new_name), false).await?
        }
        Commands::Mv { old_name, new_name } => {
            orchestrator.move_file(&old_name, &new_name).await?
        }
        Commands::Mkdir { name } => orchestrator.mkdir(name.as_deref()).await?,
        Commands::Whoami => whoami(&orchestrator).await,
        Commands::Shell => run_shell(&orchestrator, config.auth.username.as_deref()).await?,
        // Handled before connecting
        Commands::Init { .. } => {}
    }

    Ok(())
}

/// Write `config` to `path` unless a file is already there.
fn init_config(config: &Config, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    config.save(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

/// Mirrors lifecycle events into the log.
fn spawn_event_logger<P: RemoteFilePrimitive>(orchestrator: &FileOrchestrator<P>) {
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                OperationEvent::Begin { .. } | OperationEvent::Completed { .. } => {
                    tracing::trace!(?event, "Operation event");
                }
                other => tracing::debug!(event = ?other, "Operation event"),
            }
        }
    });
}

/// Read the password from the environment or the terminal.
async fn read_password(user: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    let prompt = format!("Password for {user}: ");
    tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .context("Password prompt task failed")?
        .context("Failed to read password")
}

async fn login<P: RemoteFilePrimitive>(
    orchestrator: &FileOrchestrator<P>,
    user: &str,
) -> Result<()> {
    let password = read_password(user).await?;
    let outcome = orchestrator.login(user, &password).await;
    report_probe(&outcome);
    Ok(())
}

fn report_probe(outcome: &ProbeOutcome) {
    match outcome {
        ProbeOutcome::Authorized(Some(session)) => {
            tracing::info!("Authorized as {}", session.principal);
        }
        ProbeOutcome::Authorized(None) => tracing::debug!("Service accepted the request"),
        ProbeOutcome::Challenged(challenge) => {
            eprintln!("Authentication required ({challenge})");
        }
        ProbeOutcome::NotFound(url) => eprintln!("Service root not found: {url}"),
        ProbeOutcome::TransportError(status) => {
            eprintln!("Service unreachable (status {status})");
        }
    }
}

async fn whoami<P: RemoteFilePrimitive>(orchestrator: &FileOrchestrator<P>) {
    match orchestrator.session().await {
        Some(session) => {
            println!("{}", session.principal);
            if let Some(group) = &session.group {
                println!("  group: {group}");
            }
            if let Some(home) = &session.home {
                println!("  home:  {home}");
            }
        }
        None => println!("anonymous"),
    }
}

async fn get<P: RemoteFilePrimitive>(
    orchestrator: &FileOrchestrator<P>,
    name: &str,
    output: Option<&Path>,
) -> Result<()> {
    let data = orchestrator.download(name).await?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("saved {} bytes to {}", data.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn format_entry(entry: &DirEntry) -> String {
    let marker = if entry.is_directory() { 'd' } else { '-' };
    let size = entry.size.as_deref().unwrap_or("");
    format!("{marker} {size:>10}  {}", entry.name)
}

fn print_listing(entries: &[DirEntry]) {
    for entry in entries {
        println!("{}", format_entry(entry));
    }
}

/// Interactive shell over stdin.
async fn run_shell<P: RemoteFilePrimitive>(
    orchestrator: &FileOrchestrator<P>,
    default_user: Option<&str>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("fileshell:{}> ", orchestrator.cwd().await);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match execute(orchestrator, command, default_user).await {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(())) => break,
            Err(e) => eprintln!("error: {e:#}"),
        }
    }

    Ok(())
}

async fn execute<P: RemoteFilePrimitive>(
    orchestrator: &FileOrchestrator<P>,
    command: ShellCommand,
    default_user: Option<&str>,
) -> Result<ControlFlow<()>> {
    match command {
        ShellCommand::Ls(path) => print_listing(&orchestrator.list(path.as_deref()).await?),
        ShellCommand::Cd(path) => {
            let target = match path {
                Some(path) => path,
                None => orchestrator
                    .session()
                    .await
                    .and_then(|s| s.home)
                    .unwrap_or_else(|| "/".to_string()),
            };
            orchestrator.change_directory(&target).await?;
        }
        ShellCommand::Pwd => println!("{}", orchestrator.cwd().await),
        ShellCommand::Rm(name) => orchestrator.remove(&name).await?,
        ShellCommand::Cp { name, new_name } => {
            orchestrator.copy(&name, new_name.as_deref(), false).await?;
            if new_name.is_none() {
                println!("{} entries on the clipboard", orchestrator.clipboard_len().await);
            }
        }
        ShellCommand::Cut(name) => {
            orchestrator.cut(&name).await?;
            println!("{} entries on the clipboard", orchestrator.clipboard_len().await);
        }
        ShellCommand::Paste => match orchestrator.paste().await? {
            Some(name) => println!("pasted {name}"),
            None => println!("clipboard is empty"),
        },
        ShellCommand::Clear => {
            let dropped = orchestrator.clear_clipboard().await;
            println!("dropped {dropped} clipboard entries");
        }
        ShellCommand::Mv { old_name, new_name } => {
            orchestrator.move_file(&old_name, &new_name).await?
        }
        ShellCommand::Mkdir(name) => orchestrator.mkdir(name.as_deref()).await?,
        ShellCommand::Put(file) => {
            let name = orchestrator.upload(&file).await?;
            println!("uploaded {name}");
        }
        ShellCommand::Get { name, output } => get(orchestrator, &name, output.as_deref()).await?,
        ShellCommand::Login(user) => {
            let user = user
                .as_deref()
                .or(default_user)
                .context("login: missing USER")?;
            login(orchestrator, user).await?;
        }
        ShellCommand::Logout => report_probe(&orchestrator.logout().await),
        ShellCommand::Whoami => whoami(orchestrator).await,
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Exit => return Ok(ControlFlow::Break(())),
    }
    Ok(ControlFlow::Continue(()))
}
