//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, SearchArgs};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::harvest::Harvester;
use crate::http::{HttpClient, Resource};
use crate::query::{QueryEngine, SearchParams};
use crate::scheduler::Scheduler;
use crate::server;
use crate::store::{DuckDbStore, StayStore};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = AppConfig::load(self.cli.config.as_deref())?;

        match &self.cli.command {
            Commands::Serve { port, no_scheduler } => {
                let mut config = config;
                if let Some(port) = port {
                    config.app.port = *port;
                }
                self.serve(&config, !*no_scheduler).await
            }
            Commands::Harvest { only } => {
                let resources = match only {
                    Some(resource) => vec![Resource::from(*resource)],
                    None => Resource::ALL.to_vec(),
                };
                self.harvest(&config, resources).await
            }
            Commands::Search(args) => self.search(&config, args.clone()).await,
            Commands::InitStore => self.init_store(&config).await,
        }
    }

    /// Serve the query API, with the scheduler alongside unless disabled
    async fn serve(&self, config: &AppConfig, with_scheduler: bool) -> Result<()> {
        let store = open_store(config)?;
        let shutdown = CancellationToken::new();
        cancel_on_ctrl_c(shutdown.clone());

        let scheduler = if with_scheduler {
            let harvester = build_harvester(config, store.clone(), shutdown.clone())?;
            let scheduler = Scheduler::new(harvester)
                .with_interval(config.harvest.interval())
                .with_run_on_startup(config.harvest.run_on_startup);
            let token = shutdown.clone();
            Some(tokio::spawn(async move { scheduler.run(token).await }))
        } else {
            None
        };

        let served = server::serve(&config.app, QueryEngine::new(store), shutdown.clone()).await;
        shutdown.cancel();

        if let Some(handle) = scheduler {
            match handle.await {
                Ok(cycles) => info!(cycles, "Scheduler finished"),
                Err(e) => warn!(error = %e, "Scheduler task failed"),
            }
        }

        served
    }

    /// Run a single harvest cycle and print the report
    async fn harvest(&self, config: &AppConfig, resources: Vec<Resource>) -> Result<()> {
        let store = open_store(config)?;
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());

        let harvester = build_harvester(config, store, cancel)?;
        let harvester = {
            let harvest_config = harvester.config().clone().with_resources(resources);
            harvester.with_config(harvest_config)
        };

        let report = harvester.harvest().await?;
        print_json(&report)
    }

    /// Run a search against the local store and print the page
    async fn search(&self, config: &AppConfig, args: SearchArgs) -> Result<()> {
        let spec = SearchParams::from(args).validate()?;
        let engine = QueryEngine::new(open_store(config)?);
        let result = engine.search(&spec).await?;
        print_json(&result)
    }

    async fn init_store(&self, config: &AppConfig) -> Result<()> {
        let store = open_store(config)?;
        store.ensure_schema().await?;
        println!("Store ready at {}", store.path());
        Ok(())
    }
}

fn open_store(config: &AppConfig) -> Result<DuckDbStore> {
    if config.store.is_in_memory() {
        warn!("Using an in-memory store; harvested data is lost on exit");
    }
    DuckDbStore::open(&config.store.path)
}

fn build_harvester(
    config: &AppConfig,
    store: DuckDbStore,
    cancel: CancellationToken,
) -> Result<Harvester<HttpClient, DuckDbStore>> {
    let client = HttpClient::with_config(config.to_http_config()?)?;
    Ok(Harvester::new(client, store)
        .with_config(config.to_harvest_config())
        .with_cancellation(cancel))
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            token.cancel();
        }
    });
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(Error::from)?;
    println!("{json}");
    Ok(())
}
