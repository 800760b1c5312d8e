use anyhow::{anyhow, bail, Context, Result};
use backoffice_store::catalog;
use backoffice_store::config;
use backoffice_store::descriptor::ResourceDescriptor;
use backoffice_store::{Record, ResourceStore, RestClient, SortOrder, SortState};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "Manage restaurant back-office records over the REST API")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "backoffice.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print one page of an entity
    List {
        entity: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        sort_column: Option<String>,
        /// asc or desc
        #[arg(long, default_value = "asc")]
        sort_order: SortOrder,
    },
    /// Create a record from a JSON object
    Create {
        entity: String,
        #[arg(long)]
        json: String,
    },
    /// Update a record from a JSON object (the id comes from the argument)
    Update {
        entity: String,
        id: String,
        #[arg(long)]
        json: String,
    },
    /// Delete a record
    Delete { entity: String, id: String },
    /// Load the lookup lists an entity's forms use
    Refs { entity: String },
    /// Print the known entities
    Entities,
}

fn lookup(entity: &str) -> Result<ResourceDescriptor> {
    catalog::descriptor(entity)
        .copied()
        .ok_or_else(|| anyhow!("unknown entity '{}'; try `backoffice entities`", entity))
}

fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--json is not valid JSON")?;
    if !value.is_object() {
        bail!("--json must be a JSON object");
    }
    Ok(value)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_catalog() {
    for d in catalog::ALL {
        let sorting = d
            .sorting
            .map(|s| format!("sortable by {}", s.columns.join(", ")))
            .unwrap_or_else(|| "unsorted".into());
        let mode = if d.read_only { "read-only" } else { "read-write" };
        println!("{:<16} /api/{:<16} {} {}", d.name, d.route, mode, sorting);
    }
}

async fn run(command: Command, cfg: &config::Config) -> Result<()> {
    let client: Arc<RestClient> = Arc::new(RestClient::new(&cfg.client_settings())?);
    info!(base_url = %client.base_url(), "using back-office API");
    let open = |entity: &str| -> Result<ResourceStore<Record>> {
        Ok(ResourceStore::new(lookup(entity)?, client.clone(), cfg.store_settings()))
    };

    match command {
        Command::List {
            entity,
            page,
            sort_column,
            sort_order,
        } => {
            let store = open(&entity)?;
            let sort = sort_column.map(|column| SortState::new(column, sort_order));
            let state = store.fetch_page(page, sort).await?;
            print_json(&json!({
                "items": state.items,
                "currentPage": state.current_page,
                "pageSize": state.page_size,
                "totalItems": state.total_items,
                "totalPages": state.total_pages(),
                "sort": state.sort,
            }))?;
        }
        Command::Create { entity, json } => {
            let store = open(&entity)?;
            let created = store.create(&parse_object(&json)?).await?;
            print_json(&json!({ "created": created, "totalItems": store.total_items() }))?;
        }
        Command::Update { entity, id, json } => {
            let store = open(&entity)?;
            let response = store.update(&id, &parse_object(&json)?).await?;
            print_json(&json!({ "updated": id, "response": response }))?;
        }
        Command::Delete { entity, id } => {
            let store = open(&entity)?;
            store.delete(&id).await?;
            print_json(&json!({ "deleted": id, "totalItems": store.total_items() }))?;
        }
        Command::Refs { entity } => {
            let store = open(&entity)?;
            let mut out = serde_json::Map::new();
            for (name, res) in store.load_references().await {
                let value = match res {
                    Ok(_) => serde_json::to_value(store.references(name))?,
                    Err(err) => json!({ "error": err.to_string() }),
                };
                out.insert(name.to_string(), value);
            }
            print_json(&out)?;
        }
        Command::Entities => print_catalog(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::Entities = args.command {
        print_catalog();
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))?;
    run(args.command, &cfg).await
}
