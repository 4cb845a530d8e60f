mod config;

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use log::{info, warn};

use keel_core::monitor::{MonitorResult, ServiceEvent};
use keel_core::service::StaticServiceFactory;
use keel_core::{Kernel, KernelError, ServiceMonitor, ServiceName, ServiceState};

/// Keel: a service lifecycle kernel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register services and run the kernel until interrupted
    Run {
        /// TOML file declaring the services to register
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the service state table
    States,
    /// Parse a service name and print its canonical form
    ParseName {
        /// Name in text form, e.g. `db:role=primary`
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    match args.command {
        Commands::Run { config } => {
            init_logging();
            run(config).await
        }
        Commands::States => states(),
        Commands::ParseName { name } => parse_name(&name),
    }
}

/// Route the library's `log` records through the tracing subscriber.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = tracing_log::LogTracer::init();
    }
}

async fn run(config_path: Option<PathBuf>) -> ExitCode {
    let config = match config_path {
        Some(path) => match config::Config::load(&path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("error: {}", error);
                return ExitCode::FAILURE;
            }
        },
        None => config::Config::demo(),
    };

    let kernel = Kernel::new();
    kernel.add_service_monitor(Arc::new(LogMonitor)).await;

    let mut owned_names = HashSet::new();
    let mut registered = Vec::new();
    for service in &config.services {
        let name = match service.name.parse::<ServiceName>() {
            Ok(name) => name,
            Err(error) => {
                eprintln!("error: invalid service name '{}': {}", service.name, error);
                return ExitCode::FAILURE;
            }
        };
        let mut factory = StaticServiceFactory::new(service.name.clone());
        for type_tag in &service.types {
            factory = factory.with_type(type_tag.clone());
        }
        for owned in &service.owned {
            let owned_name = match owned.parse::<ServiceName>() {
                Ok(owned_name) => owned_name,
                Err(error) => {
                    eprintln!("error: invalid owned service name '{}': {}", owned, error);
                    return ExitCode::FAILURE;
                }
            };
            owned_names.insert(owned_name.clone());
            factory = factory.with_owned_service(owned_name);
        }
        if let Some(restartable) = service.restartable {
            factory = factory.restartable(restartable);
        }
        if let Err(error) = kernel.register_service(&name, Box::new(factory)).await {
            eprintln!("error: failed to register '{}': {}", name, error);
            return ExitCode::FAILURE;
        }
        registered.push(name);
    }

    // Start from the ownership roots; everything else is reached through
    // the recursive walk.
    for name in registered.iter().filter(|n| !owned_names.contains(*n)) {
        match kernel.start_service_recursive(name).await {
            Ok(()) => {}
            Err(KernelError::UnsatisfiedConditions { .. }) => {
                info!("Service '{}' is waiting on start conditions", name);
            }
            Err(error) => {
                eprintln!("error: failed to start '{}': {}", name, error);
                kernel.destroy().await;
                return ExitCode::FAILURE;
            }
        }
    }

    match serde_json::to_string_pretty(&kernel.snapshot().await) {
        Ok(json) => println!("{}", json),
        Err(error) => warn!("Could not serialize registry snapshot: {}", error),
    }

    info!(
        "Kernel running with {} services, press ctrl-c to stop",
        kernel.service_count().await
    );
    if let Err(error) = tokio::signal::ctrl_c().await {
        eprintln!("error: could not listen for shutdown signal: {}", error);
    }

    kernel.destroy().await;
    kernel.wait_for_destruction().await;
    info!("Shutdown complete");
    ExitCode::SUCCESS
}

fn states() -> ExitCode {
    for state in [
        ServiceState::Starting,
        ServiceState::Running,
        ServiceState::Stopping,
        ServiceState::Stopped,
    ] {
        println!("{} {}", state.index(), state);
    }
    ExitCode::SUCCESS
}

fn parse_name(input: &str) -> ExitCode {
    match input.parse::<ServiceName>() {
        Ok(name) => {
            println!("{}", name);
            println!("domain: {}", name.domain());
            for (key, value) in name.properties() {
                println!("property: {}={}", key, value);
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
    }
}

/// Logs every lifecycle transition at an appropriate level.
struct LogMonitor;

#[async_trait]
impl ServiceMonitor for LogMonitor {
    async fn service_running(&self, event: &ServiceEvent) -> MonitorResult {
        info!("{} is running", event.service_name);
        Ok(())
    }

    async fn service_waiting_to_start(&self, event: &ServiceEvent) -> MonitorResult {
        info!(
            "{} is waiting to start on: {}",
            event.service_name,
            event.unsatisfied_conditions.join(", ")
        );
        Ok(())
    }

    async fn service_stopped(&self, event: &ServiceEvent) -> MonitorResult {
        info!("{} has stopped", event.service_name);
        Ok(())
    }

    async fn service_start_error(&self, event: &ServiceEvent) -> MonitorResult {
        if let Some(cause) = &event.cause {
            warn!("{} failed to start: {}", event.service_name, cause);
        }
        Ok(())
    }
}
