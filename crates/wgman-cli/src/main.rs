//! wg-manager: WireGuard client provisioning on a single gateway

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use wgman_core::{ClientManager, ManagerError, Operation, Outcome, StatusReport};
use wgman_metrics::{init_logging, LogConfig};
use wgman_protocol::{ClientName, Config, DEFAULT_CONFIG_PATH};

/// wg-manager: add, list, remove and export WireGuard clients
#[derive(Debug, Parser)]
#[command(name = "wg-manager")]
#[command(version)]
#[command(about = "Provision WireGuard clients on a single gateway", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        env = "WG_MANAGER_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a client: allocate an address, issue keys, apply the peer
    Add {
        /// Client name (3-20 characters of A-Z a-z 0-9 _ -)
        name: String,
    },

    /// List clients as `<name> <address> <created>`
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a client and retract its peer
    Remove {
        /// Client name
        name: String,
    },

    /// Print a client's configuration
    Export {
        /// Client name
        name: String,
    },

    /// Show interface and address pool status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print usage
    Help,
}

impl Commands {
    fn operation(&self) -> Result<Operation, ManagerError> {
        Ok(match self {
            Commands::Add { name } => Operation::Add(ClientName::parse(name)?),
            Commands::List { .. } => Operation::List,
            Commands::Remove { name } => Operation::Remove(ClientName::parse(name)?),
            Commands::Export { name } => Operation::Export(ClientName::parse(name)?),
            Commands::Status { .. } => Operation::Status,
            Commands::Help => Operation::Help,
        })
    }

    fn json(&self) -> bool {
        matches!(
            self,
            Commands::List { json: true } | Commands::Status { json: true }
        )
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    let Some(command) = cli.command.as_ref() else {
        eprintln!("{}", Cli::command().render_usage());
        process::exit(1);
    };

    let operation = match command.operation() {
        Ok(operation) => operation,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    if let Err(e) = run(&cli, &operation, command.json()) {
        eprintln!("Error: {:#}", e);
        process::exit(exit_code(&e));
    }
}

fn run(cli: &Cli, operation: &Operation, json: bool) -> Result<()> {
    // help needs no configuration
    let outcome = match operation {
        Operation::Help => Outcome::Usage,
        _ => execute(cli, operation)?,
    };
    print!("{}", render(&outcome, json)?);
    Ok(())
}

fn execute(cli: &Cli, operation: &Operation) -> Result<Outcome> {
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_settings(&config.log.level, &config.log.format)
    };
    init_logging(&log_config);
    tracing::debug!(
        config = %cli.config.display(),
        operation = operation.keyword(),
        "Loaded configuration"
    );

    let manager =
        ClientManager::from_config(&config).context("Failed to initialise client manager")?;
    Ok(manager.execute(operation)?)
}

/// Exit code for an error: the manager's category, else external failure
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<ManagerError>())
        .map_or(2, ManagerError::exit_code)
}

/// Text written to stdout for an outcome
fn render(outcome: &Outcome, json: bool) -> Result<String> {
    let mut out = String::new();
    match outcome {
        Outcome::Added { name, address, .. } => {
            out.push_str(&format!("Added client: {}\n", name));
            out.push_str(&format!("IP: {}\n", address));
        }
        Outcome::Listed(clients) if json => {
            out.push_str(&serde_json::to_string_pretty(clients)?);
            out.push('\n');
        }
        Outcome::Listed(clients) => {
            for client in clients {
                out.push_str(&format!("{} {}", client.name, client.address));
                if let Some(created) = client.created_at {
                    out.push_str(&format!(" {}", created.to_rfc3339()));
                }
                out.push('\n');
            }
        }
        Outcome::Removed(client) => {
            out.push_str(&format!("Removed client: {}\n", client.name));
        }
        Outcome::Exported { config, .. } => out.push_str(config),
        Outcome::Status(report) if json => {
            out.push_str(&serde_json::to_string_pretty(report)?);
            out.push('\n');
        }
        Outcome::Status(report) => out.push_str(&render_status(report)),
        Outcome::Usage => {
            out.push_str(&Cli::command().render_long_help().to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    Ok(out)
}

fn render_status(report: &StatusReport) -> String {
    let mut out = format!("interface: {}\n", report.interface);
    out.push_str(&format!(
        "  state: {}\n",
        if report.up { "up" } else { "down" }
    ));
    out.push_str(&format!("  backend: {}\n", report.backend));
    out.push_str(&format!("  endpoint: {}\n", report.endpoint));
    out.push_str(&format!("  peers: {}\n", report.peers));
    out.push_str(&format!(
        "  clients: {}/{} ({:.1}%)\n",
        report.clients, report.capacity, report.utilization_percent
    ));
    out.push_str(&format!("  health: {}\n", report.health.status));
    for check in &report.health.checks {
        if let Some(message) = &check.message {
            out.push_str(&format!("    {}: {} ({})\n", check.name, check.status, message));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use wgman_core::ClientSummary;
    use wgman_metrics::{simple_check, utilization_check, HealthReport};
    use wgman_protocol::PublicKey;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("wg-manager").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_operations() {
        let cli = parse(&["add", "alice"]).unwrap();
        assert_eq!(
            cli.command.unwrap().operation().unwrap(),
            Operation::Add(ClientName::parse("alice").unwrap())
        );

        let cli = parse(&["list", "--json"]).unwrap();
        let command = cli.command.unwrap();
        assert_eq!(command.operation().unwrap(), Operation::List);
        assert!(command.json());

        let cli = parse(&["help"]).unwrap();
        assert_eq!(cli.command.unwrap().operation().unwrap(), Operation::Help);

        let cli = parse(&["-c", "/tmp/wg.toml", "status"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/wg.toml"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["frobnicate"]).is_err());
        assert!(parse(&["add"]).is_err());
        assert_eq!(
            parse(&["--help"]).unwrap_err().kind(),
            ErrorKind::DisplayHelp
        );
    }

    #[test]
    fn test_invalid_name_exits_one() {
        let cli = parse(&["add", "a!"]).unwrap();
        let err = cli.command.unwrap().operation().unwrap_err();
        assert!(matches!(err, ManagerError::InvalidName(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_through_context() {
        let err = anyhow::Error::new(ManagerError::NotFound("ghost".into())).context("remove");
        assert_eq!(exit_code(&err), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 2);
    }

    #[test]
    fn test_render_added_and_list() {
        let added = Outcome::Added {
            name: ClientName::parse("alice").unwrap(),
            address: Ipv4Addr::new(10, 0, 0, 2),
            public_key: PublicKey([1u8; 32]),
        };
        assert_eq!(
            render(&added, false).unwrap(),
            "Added client: alice\nIP: 10.0.0.2\n"
        );

        let listed = Outcome::Listed(vec![
            ClientSummary {
                name: ClientName::parse("alice").unwrap(),
                address: Ipv4Addr::new(10, 0, 0, 2),
                created_at: None,
            },
            ClientSummary {
                name: ClientName::parse("bob").unwrap(),
                address: Ipv4Addr::new(10, 0, 0, 3),
                created_at: None,
            },
        ]);
        assert_eq!(
            render(&listed, false).unwrap(),
            "alice 10.0.0.2\nbob 10.0.0.3\n"
        );

        let json: serde_json::Value =
            serde_json::from_str(&render(&listed, true).unwrap()).unwrap();
        assert_eq!(json[1]["name"], "bob");
        assert_eq!(json[1]["address"], "10.0.0.3");

        assert_eq!(render(&Outcome::Listed(Vec::new()), false).unwrap(), "");
    }

    #[test]
    fn test_help_renders_usage_without_config() {
        let cli = parse(&["-c", "/nonexistent/wg-manager.toml", "help"]).unwrap();
        assert!(run(&cli, &Operation::Help, false).is_ok());

        let usage = render(&Outcome::Usage, false).unwrap();
        for keyword in ["add", "list", "remove", "export", "status"] {
            assert!(usage.contains(keyword), "usage lacks {}", keyword);
        }
    }

    #[test]
    fn test_render_status() {
        let report = StatusReport {
            interface: "wg0".into(),
            backend: "wg".into(),
            up: false,
            peers: 0,
            clients: 2,
            capacity: 253,
            utilization_percent: 2.0 * 100.0 / 253.0,
            endpoint: "203.0.113.10:51820".into(),
            health: HealthReport::from_checks(vec![
                simple_check("interface", false, Some("wg0 is down")),
                utilization_check("address_pool", 2, 253),
            ]),
        };

        let text = render_status(&report);
        assert!(text.starts_with("interface: wg0\n  state: down\n"));
        assert!(text.contains("  clients: 2/253 (0.8%)\n"));
        assert!(text.contains("  health: unhealthy\n"));
        assert!(text.contains("    interface: unhealthy (wg0 is down)\n"));
    }
}
