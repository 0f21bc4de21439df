//! CLI commands and argument parsing

use crate::http::Resource;
use crate::query::SearchParams;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Stay harvester CLI
#[derive(Parser, Debug)]
#[command(name = "stay-harvester")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the search API and run scheduled harvests
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve queries only, without the harvest scheduler
        #[arg(long)]
        no_scheduler: bool,
    },

    /// Run one harvest cycle and print its statistics
    Harvest {
        /// Harvest a single resource
        #[arg(long, value_enum)]
        only: Option<ResourceArg>,
    },

    /// Search stored stays and print the result page
    Search(SearchArgs),

    /// Create the stays table if it does not exist
    InitStore,
}

/// Resource selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResourceArg {
    /// Detailed stay profiles
    Profiles,
    /// Compact stay summaries
    Summaries,
}

impl From<ResourceArg> for Resource {
    fn from(arg: ResourceArg) -> Self {
        match arg {
            ResourceArg::Profiles => Resource::Profiles,
            ResourceArg::Summaries => Resource::Summaries,
        }
    }
}

/// Search filters, validated the same way as HTTP query parameters
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Free text matched against name, city and country
    #[arg(long)]
    pub text: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub city: Option<String>,

    #[arg(long)]
    pub country: Option<String>,

    /// low, medium or high
    #[arg(long)]
    pub price_segment: Option<String>,

    /// true, false, 1 or 0
    #[arg(long)]
    pub is_available: Option<String>,

    #[arg(long)]
    pub min_price: Option<String>,

    #[arg(long)]
    pub max_price: Option<String>,

    /// city, pricePerNight, name, country or priceSegment
    #[arg(long)]
    pub sort_by: Option<String>,

    /// ASC or DESC
    #[arg(long)]
    pub sort_direction: Option<String>,

    #[arg(long)]
    pub skip: Option<String>,

    #[arg(long)]
    pub limit: Option<String>,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        Self {
            text: args.text,
            name: args.name,
            city: args.city,
            country: args.country,
            price_segment: args.price_segment,
            is_available: args.is_available,
            min_price: args.min_price,
            max_price: args.max_price,
            sort_by: args.sort_by,
            sort_direction: args.sort_direction,
            skip: args.skip,
            limit: args.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_harvest_only() {
        let cli = Cli::parse_from(["stay-harvester", "-c", "app.yaml", "harvest", "--only", "summaries"]);
        assert_eq!(cli.config, Some(PathBuf::from("app.yaml")));
        match cli.command {
            Commands::Harvest { only } => {
                assert_eq!(only.map(Resource::from), Some(Resource::Summaries));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::parse_from([
            "stay-harvester",
            "search",
            "--city",
            "Paris",
            "--sort-direction",
            "DESC",
            "--limit",
            "5",
            "-v",
        ]);
        assert!(cli.verbose);
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        let params = SearchParams::from(args);
        assert_eq!(params.city.as_deref(), Some("Paris"));
        assert_eq!(params.sort_direction.as_deref(), Some("DESC"));
        assert_eq!(params.limit.as_deref(), Some("5"));
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["stay-harvester", "serve", "--port", "8080", "--no-scheduler"]);
        match cli.command {
            Commands::Serve { port, no_scheduler } => {
                assert_eq!(port, Some(8080));
                assert!(no_scheduler);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
