//! Vellum CLI: inspect and edit a metadata collection.
//!
//! Usage:
//!   vellum [--config FILE] [--db FILE] [--types FILE] init
//!   vellum entity add <TYPE> [--prop key=value]...
//!   vellum search [--type TYPE] [--text PATTERN]

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use vellum::{
    CommitMode, ConnectorConfig, FindRequest, Guid, HistoryOrder, NewEntity, Properties,
    PropertyValue, RepositoryConnector, StoreBackend, TraversalRequest, TypeDefBundle,
    TypeRegistry,
};

#[derive(Parser)]
#[command(name = "vellum", version, about = "Bitemporal metadata collection engine")]
struct Cli {
    /// Connector configuration (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to SQLite database file; overrides the configured backend
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Type definitions to load (YAML)
    #[arg(long, global = true)]
    types: Option<PathBuf>,
    /// Return from writes as soon as they are logged
    #[arg(long, global = true)]
    async_commit: bool,
    /// User recorded on writes
    #[arg(long, global = true, default_value = "vellum")]
    user: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or check the collection and install its transaction functions
    Init,
    /// List the loaded type definitions
    Types,
    /// Work with single entities
    Entity {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Find entities
    Search {
        /// Entity type name; includes subtypes
        #[arg(long = "type")]
        type_name: Option<String>,
        /// Regex that must fully match a string attribute
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value_t = 0)]
        from: i64,
        /// 0 returns up to the configured maximum
        #[arg(long, default_value_t = 0)]
        page_size: i64,
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Entities and relationships around an entity
    Neighborhood {
        guid: String,
        #[arg(long, default_value_t = 1)]
        level: usize,
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Shortest connections between two entities
    Link {
        from: String,
        to: String,
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum EntityAction {
    /// Add an entity of the named type
    Add {
        type_name: String,
        /// Property as key=value; values are parsed as JSON when possible
        #[arg(long = "prop")]
        props: Vec<String>,
    },
    /// Show an entity, optionally as it stood at an earlier time
    Get {
        guid: String,
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Show every version of an entity
    History {
        guid: String,
        /// Newest version first
        #[arg(long)]
        backward: bool,
    },
    /// Soft-delete an entity
    Delete { guid: String },
    /// Remove a deleted entity permanently
    Purge { guid: String },
}

/// Get the default database path (~/.local/share/vellum/vellum.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("vellum").join("vellum.db")
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("VELLUM_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "vellum=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Collection id kept next to the database so later runs own the same objects
fn collection_id_for(db: &Path) -> Result<String, String> {
    let id_path = db.with_extension("collection");
    if let Ok(id) = std::fs::read_to_string(&id_path) {
        let id = id.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }
    if let Some(parent) = id_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }
    let id = uuid::Uuid::new_v4().to_string();
    std::fs::write(&id_path, &id)
        .map_err(|e| format!("cannot write {}: {}", id_path.display(), e))?;
    Ok(id)
}

fn load_config(cli: &Cli) -> Result<ConnectorConfig, String> {
    let mut config = match &cli.config {
        Some(path) => ConnectorConfig::from_yaml_file(path)
            .map_err(|e| format!("Failed to load config: {}", e))?,
        None => {
            let db = cli.db.clone().unwrap_or_else(default_db_path);
            ConnectorConfig::new(
                collection_id_for(&db)?,
                "vellum",
                StoreBackend::Sqlite { path: db },
            )
        }
    };
    if let Some(db) = &cli.db {
        config = config.with_backend(StoreBackend::Sqlite { path: db.clone() });
    }
    if cli.async_commit {
        config = config.with_commit_mode(CommitMode::Asynchronous);
    }
    Ok(config)
}

fn load_registry(types: Option<&Path>) -> Result<TypeRegistry, String> {
    let registry = TypeRegistry::new();
    if let Some(path) = types {
        let bundle = TypeDefBundle::from_yaml_file(path)
            .map_err(|e| format!("Failed to load types: {}", e))?;
        for typedef in bundle.types {
            registry
                .register(typedef)
                .map_err(|e| format!("Failed to register type: {}", e))?;
        }
    }
    Ok(registry)
}

fn open_connector(cli: &Cli) -> Result<RepositoryConnector, String> {
    let config = load_config(cli)?;
    let registry = load_registry(cli.types.as_deref())?;
    RepositoryConnector::open(config, Arc::new(registry))
        .map_err(|e| format!("Failed to open repository: {}", e))
}

fn parse_property(raw: &str) -> Result<(String, PropertyValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("property '{}' is not key=value", raw))?;
    let value = serde_json::from_str::<PropertyValue>(value)
        .unwrap_or_else(|_| PropertyValue::from(value));
    Ok((key.to_string(), value))
}

fn type_guid(connector: &RepositoryConnector, name: &str) -> Result<String, String> {
    connector
        .registry()
        .resolve_name(name)
        .map(|typedef| typedef.guid.clone())
        .map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn report<T: Serialize, E: std::fmt::Display>(result: Result<T, E>) -> i32 {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_init(connector: &RepositoryConnector) -> i32 {
    print_json(&serde_json::json!({
        "metadata_collection_id": connector.metadata_collection_id(),
        "metadata_collection_name": connector.config().metadata_collection_name,
        "persistence_layer_version": vellum::repository::PERSISTENCE_LAYER_VERSION,
        "types": connector.registry().len(),
    }))
}

fn cmd_entity(
    runtime: &Runtime,
    connector: &RepositoryConnector,
    user: &str,
    action: EntityAction,
) -> i32 {
    match action {
        EntityAction::Add { type_name, props } => {
            let guid = match type_guid(connector, &type_name) {
                Ok(guid) => guid,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            };
            let properties: Result<Properties, String> =
                props.iter().map(|raw| parse_property(raw)).collect();
            let properties = match properties {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            };
            let request = NewEntity::of_type(guid).with_properties(properties);
            report(runtime.block_on(connector.add_entity(user, request)))
        }
        EntityAction::Get { guid, as_of } => {
            report(connector.get_entity_detail(user, &Guid::from(guid), as_of))
        }
        EntityAction::History { guid, backward } => {
            let order = if backward {
                HistoryOrder::Backward
            } else {
                HistoryOrder::Forward
            };
            report(connector.get_entity_detail_history(user, &Guid::from(guid), None, None, order))
        }
        EntityAction::Delete { guid } => {
            report(runtime.block_on(connector.delete_entity(user, &Guid::from(guid))))
        }
        EntityAction::Purge { guid } => {
            report(runtime.block_on(connector.purge_entity(user, &Guid::from(guid))))
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let connector = match open_connector(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let runtime = match Runtime::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let user = cli.user.clone();
    let code = match cli.command {
        Commands::Init => cmd_init(&connector),
        Commands::Types => {
            let defs = connector.registry().type_defs();
            print_json(&defs.iter().map(|t| t.as_ref()).collect::<Vec<_>>())
        }
        Commands::Entity { action } => cmd_entity(&runtime, &connector, &user, action),
        Commands::Search {
            type_name,
            text,
            from,
            page_size,
            as_of,
        } => {
            let mut request = FindRequest::new().page(from, page_size);
            if let Some(name) = type_name {
                match type_guid(&connector, &name) {
                    Ok(guid) => request = request.of_type(guid),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            if let Some(at) = as_of {
                request = request.as_of(at);
            }
            match text {
                Some(pattern) => {
                    report(connector.find_entities_by_property_value(&user, &pattern, &request))
                }
                None => report(connector.find_entities(&user, &request)),
            }
        }
        Commands::Neighborhood { guid, level, as_of } => {
            let mut request = TraversalRequest::new();
            if let Some(at) = as_of {
                request = request.as_of(at);
            }
            report(connector.get_entity_neighborhood(&user, &Guid::from(guid), level, &request))
        }
        Commands::Link { from, to, as_of } => {
            let mut request = TraversalRequest::new();
            if let Some(at) = as_of {
                request = request.as_of(at);
            }
            report(connector.get_linking_entities(
                &user,
                &Guid::from(from),
                &Guid::from(to),
                &request,
            ))
        }
    };
    std::process::exit(code);
}
