use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dhcpconf::{
    Answer, CommandChannel, ConfigEngine, ConfigNode, FsHookLoader, Result,
    apply_defaults_and_derive,
};

/// Top-level key wrapping the server's section in a full configuration file.
const SERVER_SECTION: &str = "Dhcp6";

#[derive(Parser)]
#[command(name = "dhcpconf")]
#[command(author, version, about = "Transactional DHCPv6 configuration loader", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "kea-dhcp6.json")]
    config: PathBuf,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration without applying it
    Check,
    /// Apply the configuration once and print the result
    Apply,
    /// Print the configuration after defaults and derivation
    ShowConfig,
    /// Apply the configuration and reload it on SIGHUP
    Run,
}

/// Reads the file and picks out the server section if there is one.
fn read_document(path: &Path) -> Result<ConfigNode> {
    let root = ConfigNode::load(path)?;
    Ok(match root.get(SERVER_SECTION) {
        Some(section) => section.clone(),
        None => root,
    })
}

fn command_channel() -> Box<dyn CommandChannel> {
    #[cfg(unix)]
    {
        Box::new(dhcpconf::UnixCommandChannel::new())
    }
    #[cfg(not(unix))]
    {
        Box::new(dhcpconf::DisabledCommandChannel)
    }
}

fn new_engine() -> ConfigEngine {
    ConfigEngine::new(command_channel(), Box::new(FsHookLoader::new()))
}

fn print_answer(answer: &Answer) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(answer)?);
    Ok(())
}

/// Loads the file into the engine; a failed load keeps what was running.
fn reload(engine: &mut ConfigEngine, path: &Path) -> Answer {
    match read_document(path) {
        Ok(document) => engine.configure(&document, false),
        Err(error) => Answer::from(&error),
    }
}

/// SIGHUP listener; never fires where there are no unix signals.
struct Hangup {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

impl Hangup {
    fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self {
                signal: signal(SignalKind::hangup())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        self.signal.recv().await;
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    }
}

async fn run(path: &Path) -> Result<()> {
    let mut engine = new_engine();
    info!("Loading configuration from {:?}", path);
    let answer = reload(&mut engine, path);
    if !answer.is_success() {
        error!("Initial configuration failed: {}", answer);
        print_answer(&answer)?;
        std::process::exit(answer.code);
    }

    let mut hangup = Hangup::new()?;
    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("Received SIGHUP, reloading configuration from {:?}", path);
                let answer = reload(&mut engine, path);
                if answer.is_success() {
                    info!("Reload complete: {}", engine.current().summary());
                } else {
                    warn!("Reload failed, keeping the running configuration: {}", answer);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, closing command channel...");
                engine.command_channel().close();
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => {
            let document = read_document(&cli.config)?;
            let answer = new_engine().configure(&document, true);
            print_answer(&answer)?;
            if !answer.is_success() {
                std::process::exit(answer.code);
            }
            Ok(())
        }
        Commands::Apply => {
            let mut engine = new_engine();
            let answer = reload(&mut engine, &cli.config);
            print_answer(&answer)?;
            if !answer.is_success() {
                std::process::exit(answer.code);
            }
            println!("{}", serde_json::to_string_pretty(engine.current().as_ref())?);
            Ok(())
        }
        Commands::ShowConfig => {
            let document = read_document(&cli.config)?;
            let config = apply_defaults_and_derive(&document)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Run => run(&cli.config).await,
    }
}
