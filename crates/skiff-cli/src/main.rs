//! Skiff CLI - Kubernetes resource synchronization between clusters

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

mod commands;
mod display;
mod error;
mod exit_codes;
mod health;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(author = "Skiff Contributors")]
#[command(version)]
#[command(about = "Synchronize Kubernetes resources between clusters", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(long, global = true, env = "SKIFF_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the source namespace into the destination cluster
    Sync {
        /// Kubeconfig for the source cluster
        #[arg(long)]
        src_kubeconfig: Option<PathBuf>,

        /// Namespace to synchronize from
        #[arg(short = 'n', long)]
        src_namespace: Option<String>,

        /// Kubeconfig for the destination cluster
        #[arg(long)]
        dst_kubeconfig: Option<PathBuf>,

        /// Destination namespace (defaults to the source namespace)
        #[arg(long)]
        dst_namespace: Option<String>,

        /// Resource kinds to synchronize (workload, service)
        #[arg(short = 'k', long = "kinds", value_delimiter = ',')]
        kinds: Vec<String>,

        /// Export every synced source object as a YAML manifest
        #[arg(short = 'y', long)]
        export: bool,

        /// Directory exported manifests are written under
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Watch the source cluster and deliver change notifications
    Daemon {
        /// Kubeconfig for the watched cluster
        #[arg(long)]
        src_kubeconfig: Option<PathBuf>,

        /// Namespace to watch
        #[arg(short = 'n', long)]
        namespace: Option<String>,

        /// Resource kinds to watch (workload, service)
        #[arg(short = 'k', long = "kinds", value_delimiter = ',')]
        kinds: Vec<String>,

        /// Address the health endpoint listens on
        #[arg(long)]
        health_addr: Option<String>,

        /// Notification handler deliveries go to
        #[arg(long, default_value = "log")]
        handler: String,
    },
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    exit_codes::SUCCESS
                }
                _ => exit_codes::USAGE_ERROR,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> error::Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;
    init_tracing(&config.log.level, cli.verbose);

    match cli.command {
        Commands::Sync {
            src_kubeconfig,
            src_namespace,
            dst_kubeconfig,
            dst_namespace,
            kinds,
            export,
            export_dir,
        } => {
            commands::sync::run(
                config,
                src_kubeconfig.as_deref(),
                src_namespace.as_deref(),
                dst_kubeconfig.as_deref(),
                dst_namespace.as_deref(),
                &kinds,
                export,
                export_dir.as_deref(),
            )
            .await
        }

        Commands::Daemon {
            src_kubeconfig,
            namespace,
            kinds,
            health_addr,
            handler,
        } => {
            commands::daemon::run(
                config,
                src_kubeconfig.as_deref(),
                namespace.as_deref(),
                &kinds,
                health_addr.as_deref(),
                &handler,
            )
            .await
        }
    }
}

/// `SKIFF_LOG` wins over the config file; `-v` wins over both
fn init_tracing(level: &str, verbose: bool) {
    let env = if verbose {
        "debug".to_string()
    } else {
        std::env::var("SKIFF_LOG").unwrap_or_else(|_| level.to_string())
    };
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
