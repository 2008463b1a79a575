//! WRML Schema CLI
//!
//! Inspect prototypes, import and export JSON-Schema, search schemas and
//! export the inheritance graph.

use std::path::PathBuf;
use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wrml::{Context, JsonSchemaDraft, WrmlConfig};

#[derive(Parser)]
#[command(name = "wrml-schema")]
#[command(about = "Inspect WRML schemas and prototypes")]
struct Cli {
    /// Config file (defaults to wrml.toml and the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra schema directory to load
    #[arg(short, long)]
    schemas: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the inheritance-resolved prototype of a schema
    Prototype {
        uri: String,
        /// Print the prototype as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a JSON-Schema document
    Import {
        file: PathBuf,
        /// Write the resulting WRML schemas to this directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export a schema as JSON-Schema
    Export {
        uri: String,
        /// JSON-Schema draft (3 or 4)
        #[arg(short, long, default_value_t = 4)]
        draft: u8,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fuzzy search schema titles and URIs
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Export the inheritance graph in DOT format
    Graph {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
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
    config.schemas.roots.extend(cli.schemas);
    let ctx = Context::new(config)?;
    let loader = ctx.schema_loader();

    match cli.command {
        Commands::Prototype { uri, json } => {
            let prototype = loader.get_prototype(&uri)?;
            if json {
                println!("{}", serde_json::to_string_pretty(prototype.as_ref())?);
                return Ok(());
            }

            println!("📐 {}", prototype.schema_uri());
            if let Some(title) = prototype.title() {
                println!("   title: {}", title);
            }
            println!("   linearization:");
            for uri in prototype.linearization() {
                println!("     {}", uri);
            }

            println!("   slots ({}):", prototype.slot_count());
            for proto in prototype.slots() {
                let mut flags = Vec::new();
                if proto.slot.required {
                    flags.push("required");
                }
                if proto.slot.read_only {
                    flags.push("read-only");
                }
                let declared = proto
                    .declaring_schema_uri
                    .rsplit('/')
                    .next()
                    .unwrap_or(&proto.declaring_schema_uri);
                println!(
                    "     {:<24} {:<14} {:<20} {}",
                    proto.name(),
                    proto.value().kind(),
                    declared,
                    flags.join(", ")
                );
            }

            if !prototype.key_declarations().is_empty() {
                println!("   keys:");
                for key in prototype.key_declarations() {
                    println!("     {} -> [{}]", key.schema_uri, key.slot_names.join(", "));
                }
            }
            if !prototype.link_slots().is_empty() {
                println!("   links:");
                for (slot, rel) in prototype.link_slots() {
                    println!("     {} -> {}", slot, rel);
                }
            }
            Ok(())
        }

        Commands::Import { file, output } => {
            let uris = loader
                .load_json_schema_file(&file)
                .with_context(|| format!("importing {}", file.display()))?;
            println!("✅ Imported {} schema(s) from {}", uris.len(), file.display());

            for uri in &uris {
                println!("  └─ {}", uri);
                if let (Some(dir), Some(schema)) = (&output, loader.get_schema(uri)) {
                    std::fs::create_dir_all(dir)?;
                    let path = dir.join(format!("{}.json", schema.display_name()));
                    std::fs::write(&path, serde_json::to_string_pretty(schema.as_ref())?)?;
                    println!("     written to {}", path.display());
                }
            }
            Ok(())
        }

        Commands::Export { uri, draft, output } => {
            let Some(draft) = JsonSchemaDraft::from_number(draft) else {
                bail!("unsupported JSON-Schema draft {}; use 3 or 4", draft);
            };
            let json = loader.export_json_schema(&uri, draft)?;
            let content = serde_json::to_string_pretty(&json)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    eprintln!("✅ Exported {} to {}", uri, path.display());
                }
                None => println!("{}", content),
            }
            Ok(())
        }

        Commands::Search { query, limit } => {
            let results = loader.search(&query, limit);
            if results.is_empty() {
                println!("No schemas match '{}'", query);
            }
            for result in results {
                println!(
                    "{:>5}  {}  {}",
                    result.score,
                    result.uri,
                    result.title.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }

        Commands::Graph { output } => {
            let graph = loader.graph();
            for cycle in graph.cycles() {
                eprintln!("⚠️  inheritance cycle: {}", cycle.join(" -> "));
            }
            for (schema, base) in graph.missing_bases() {
                eprintln!("⚠️  {} extends unknown schema {}", schema, base);
            }

            let dot = graph.to_dot();
            match output {
                Some(path) => {
                    std::fs::write(&path, dot)?;
                    eprintln!(
                        "✅ Exported {} schemas, {} edges to {}",
                        graph.schema_count(),
                        graph.edge_count(),
                        path.display()
                    );
                }
                None => print!("{}", dot),
            }
            Ok(())
        }
    }
}
