use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client_sdk::{DEFAULT_API_URL, WatchdogClient};
use common::HostInfo;
use common::auth::{decode_claims, now_unix};
use common::config::{WebhookKind, load_config_file};
use common::format::format_local_timestamp;
use natural_order::{Collation, compare, natural_sort_with};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "watchdog")]
#[command(about = "CLI client for the storage miner watchdog")]
struct Cli {
    #[arg(long, env = "WATCHDOG_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    #[arg(long, env = "WATCHDOG_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[arg(long, env = "WATCHDOG_USERNAME")]
    username: Option<String>,
    #[arg(long, env = "WATCHDOG_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sort lines of FILE (or stdin) in natural order.
    Sort {
        file: Option<PathBuf>,
        #[arg(long)]
        ignore_case: bool,
        #[arg(long)]
        reverse: bool,
    },
    /// Print -1, 0 or 1 for the natural order of two identifiers.
    Compare { left: String, right: String },
    Login,
    Hosts,
    Miners {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        json: bool,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    TokenStatus,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    Show,
    Check { file: PathBuf },
    Push { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Sort {
            file,
            ignore_case,
            reverse,
        } => {
            let input = read_input(file.as_deref())?;
            let mut lines: Vec<&str> = input.lines().collect();
            let collation = if *ignore_case {
                Collation::CaseInsensitive
            } else {
                Collation::Ordinal
            };
            natural_sort_with(&mut lines, collation);
            if *reverse {
                lines.reverse();
            }
            for line in lines {
                println!("{line}");
            }
        }
        Commands::Compare { left, right } => {
            println!("{}", compare(left, right) as i32);
        }
        Commands::Login => {
            let (username, password) = credentials(&cli)?;
            let client = WatchdogClient::new(&cli.api_url)?;
            let login = client.login(username, password).await?;
            println!("{}", login.token);
        }
        Commands::Hosts => {
            let client = session(&cli).await?;
            for host in client.hosts().await? {
                println!("{host}");
            }
        }
        Commands::Miners { host, json } => {
            let client = session(&cli).await?;
            let hosts = client.host_info(host.as_deref()).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&hosts)?);
            } else {
                for host in &hosts {
                    print_host(host);
                }
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let client = session(&cli).await?;
                let config = client.config().await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCommands::Check { file } => {
                let config = load_config_file(file)?;
                for (url, kind) in config.alert.webhook_kinds() {
                    if kind == WebhookKind::Unknown {
                        warn!(url, "webhook vendor not recognised");
                    }
                    println!("webhook {kind}: {url}");
                }
                for host in &config.hosts {
                    let transport = if host.uses_tls() { "tls" } else { "plain" };
                    println!("host {}:{} ({transport})", host.ip, host.port);
                }
                config.validate()?;
                println!("config ok: {} host(s)", config.hosts.len());
            }
            ConfigCommands::Push { file } => {
                let config = load_config_file(file)?;
                let client = session(&cli).await?;
                let message = client.set_config(&config).await?;
                println!("{message}");
            }
        },
        Commands::TokenStatus => {
            let token = cli
                .token
                .as_deref()
                .context("token-status needs --token or WATCHDOG_TOKEN")?;
            let claims = decode_claims(token)?;
            let expires_at = format_local_timestamp(claims.exp)
                .unwrap_or_else(|| claims.exp.to_string());
            let now = now_unix();
            if claims.is_expired_at(now) {
                println!("expired at {expires_at}");
            } else {
                println!(
                    "valid until {expires_at} ({}s remaining)",
                    claims.remaining_secs(now)
                );
            }
        }
    }

    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            Ok(input)
        }
    }
}

fn credentials(cli: &Cli) -> Result<(&str, &str)> {
    match (cli.username.as_deref(), cli.password.as_deref()) {
        (Some(username), Some(password)) => Ok((username, password)),
        _ => bail!("login needs --username and --password (or WATCHDOG_USERNAME/WATCHDOG_PASSWORD)"),
    }
}

async fn session(cli: &Cli) -> Result<WatchdogClient> {
    let client = WatchdogClient::new(&cli.api_url)?;

    if let Some(token) = &cli.token {
        client.set_token(token).await;
    } else if cli.username.is_some() {
        let (username, password) = credentials(cli)?;
        client.login(username, password).await?;
    } else {
        info!("no token or credentials given");
    }

    Ok(client)
}

fn print_host(host: &HostInfo) {
    println!("Host {}", host.host);
    if host.miner_info_list.is_empty() {
        println!("  (no storage nodes)");
        return;
    }

    let width = host
        .miner_info_list
        .iter()
        .map(|miner| miner.signature_acc.len())
        .max()
        .unwrap_or(0)
        .max("SIGNATURE ACCOUNT".len());

    println!(
        "  {:<width$}  {:<12}  {:<9}  CREATED",
        "SIGNATURE ACCOUNT", "STATUS", "PUNISHED"
    );
    for miner in &host.miner_info_list {
        let created = format_local_timestamp(miner.container.created).unwrap_or_default();
        println!(
            "  {:<width$}  {:<12}  {:<9}  {}",
            miner.signature_acc,
            miner.stat.status,
            if miner.is_punished() { "yes" } else { "no" },
            created
        );
    }

    let frozen = host
        .miner_info_list
        .iter()
        .filter(|miner| miner.is_frozen())
        .count();
    if frozen > 0 {
        println!("  {frozen} frozen");
    }
}
