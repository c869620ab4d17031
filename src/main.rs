//! Binary entrypoint for the meshgate CLI.
//!
//! Commands:
//! - `start` - run the gateway against the configured radio host
//! - `init` - create a starter `config.toml`
//! - `status` - print the parsed configuration summary
//!
//! See the library crate docs for module-level details: `meshgate::`.
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use meshgate::config::Config;
use meshgate::gateway::HandlerServer;
use meshgate::transport::TcpTransport;

#[derive(Parser)]
#[command(name = "meshgate")]
#[command(about = "Gateway bridging mesh radios to pluggable text services")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Start {
        /// Radio host address, overriding the config file (host:port)
        #[arg(long)]
        host: Option<String>,
    },
    /// Initialize a new gateway configuration
    Init,
    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (Init writes its own later)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { host } => {
            let mut config = Config::load(&cli.config).await?;
            if let Some(addr) = host {
                let (h, p) = addr
                    .rsplit_once(':')
                    .ok_or_else(|| anyhow::anyhow!("--host expects host:port"))?;
                config.transport.host = h.to_string();
                config.transport.port = p.parse()?;
            }
            info!("Starting meshgate v{}", env!("CARGO_PKG_VERSION"));
            let transport = Arc::new(TcpTransport::new(config.transport.clone()));
            let mut server = HandlerServer::new(config, transport)?;

            // Ctrl-C triggers a clean stop: cleanup task cancelled, transport
            // disconnected, in-flight message allowed to finish.
            tokio::select! {
                result = server.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received, shutting down");
                    server.stop().await;
                }
            }
            Ok(())
        }
        Commands::Init => {
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                anyhow::bail!("{} already exists; refusing to overwrite", cli.config);
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote starter configuration to {}", cli.config);
            println!("Edit the [transport] and plugin sections, then run: meshgate start");
            Ok(())
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            println!("{} configuration ({})", config.gateway.name, cli.config);
            println!(
                "  radio host:     {}:{}",
                config.transport.host, config.transport.port
            );
            println!(
                "  sessions:       timeout {}m, cap {}",
                config.gateway.session_timeout_minutes,
                if config.gateway.max_sessions == 0 {
                    "unlimited".to_string()
                } else {
                    config.gateway.max_sessions.to_string()
                }
            );
            println!(
                "  rate limit:     {} ({} msgs / {}s)",
                if config.security.rate_limit_enabled {
                    "enabled"
                } else {
                    "disabled"
                },
                config.security.rate_limit_messages,
                config.security.rate_limit_window_seconds
            );
            println!("  max frame:      {} bytes", config.gateway.max_message_size);
            let plugins = [
                ("gopher", config.gopher.enabled),
                ("llm", config.llm.enabled),
                ("weather", config.weather.enabled),
                ("wikipedia", config.wikipedia.enabled),
            ];
            let enabled: Vec<&str> = plugins
                .iter()
                .filter(|(_, on)| *on)
                .map(|(name, _)| *name)
                .collect();
            println!("  plugins:        {}", enabled.join(", "));
            Ok(())
        }
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the config file level
    let level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level.parse().unwrap_or(log::LevelFilter::Info))
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(path) = file {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            let file_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
            builder.init();
            return;
        }
        eprintln!("Could not open log file {}; logging to stderr", path);
    }

    builder.format(|fmt, record| {
        writeln!(
            fmt,
            "{} [{}] {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            record.level(),
            record.args()
        )
    });
    builder.init();
}
