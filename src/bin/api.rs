//! WRML API CLI
//!
//! Print resource trees, route requests and list link templates of the
//! configured APIs.

use std::path::PathBuf;
use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wrml::{Context, Method, WrmlConfig};

#[derive(Parser)]
#[command(name = "wrml-api")]
#[command(about = "Navigate WRML REST API metadata")]
struct Cli {
    /// Config file (defaults to wrml.toml and the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra API directory to load
    #[arg(short, long)]
    apis: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resource tree of an API
    Tree { api: String },

    /// Route a request to a resource
    Route {
        method: String,
        uri: String,
        /// Print the route as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the link templates of an API
    Links { api: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = WrmlConfig::load_from(cli.config.as_deref().and_then(|p| p.to_str()))
        .context("loading configuration")?;
    config.apis.roots.extend(cli.apis);
    let ctx = Context::new(config)?;
    let apis = ctx.api_loader();

    match cli.command {
        Commands::Tree { api } => {
            let navigator = apis
                .navigator(&api)
                .ok_or_else(|| anyhow!("unknown API {}", api))?;
            let title = navigator.api().title.as_deref().unwrap_or("");
            println!("🌐 {} {}", navigator.base_uri(), title);
            print!("{}", navigator.describe_tree());
            Ok(())
        }

        Commands::Route { method, uri, json } => {
            let method: Method = method.parse()?;
            let navigator = apis
                .navigator_for_uri(&uri)
                .ok_or_else(|| anyhow!("no API serves {}", uri))?;
            let route = navigator.route(method, &uri)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&route)?);
                return Ok(());
            }
            println!("✅ {} {}", route.method, route.full_path);
            for (name, value) in &route.params {
                println!("   {} = {}", name, value);
            }
            if let Some(rel) = &route.link_relation_uri {
                println!("   relation: {}", rel);
            }
            if let Some(schema) = &route.request_schema_uri {
                println!("   request:  {}", schema);
            }
            if let Some(schema) = &route.response_schema_uri {
                println!("   response: {}", schema);
            }
            Ok(())
        }

        Commands::Links { api } => {
            let navigator = apis
                .navigator(&api)
                .ok_or_else(|| anyhow!("unknown API {}", api))?;
            let path_of = |id: &uuid::Uuid| {
                navigator
                    .resource(id)
                    .map(|r| r.full_path.clone())
                    .unwrap_or_else(|| id.to_string())
            };

            for link in &navigator.api().link_templates {
                let method = navigator
                    .link_relation(&link.link_relation_uri)
                    .map(|r| r.method.protocol_name())
                    .unwrap_or("?");
                println!(
                    "{:<7} {} -> {}  ({})",
                    method,
                    path_of(&link.referrer_id),
                    path_of(&link.end_point_id),
                    link.link_relation_uri
                );
            }
            Ok(())
        }
    }
}
