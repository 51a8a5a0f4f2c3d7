use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, ContentArrangement, Table};
use configuration::DatabaseOverrides;
use core_types::ident::ID_COLUMN;
use core_types::{ModelKind, SchemaValidator, Value, ValueType};
use database::{ColumnFilter, ConnectionManager, PersistenceEngine, RowSet, RowStore};
use models::ModelRegistry;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

mod kinds;

/// The main entry point for the marquee command-line tool.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Credentials may live in a .env file; it is optional.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = configuration::load_config_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    config.database.apply_overrides(&cli.database);
    let _log_guard = configuration::init_tracing(&config.logging);

    let kinds = kinds::load(&config)?;
    tracing::info!(
        kinds = ?kinds.keys().collect::<Vec<_>>(),
        target_db = %config.database.connection_target(),
        "Configuration loaded."
    );
    let registry = ModelRegistry::new(SchemaValidator::new(Arc::new(config.type_catalog())));
    let connection = Arc::new(ConnectionManager::new(config.database.clone()));
    let engine = PersistenceEngine::new(Arc::clone(&connection));

    let app = App {
        kinds,
        registry,
        engine,
    };

    // Execute the appropriate command
    let outcome = match cli.command {
        Commands::Init => app.init().await,
        Commands::Check => app.check().await,
        Commands::Add(args) => app.add(args).await,
        Commands::List(args) => app.list(args).await,
    };

    connection.close().await;
    outcome
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Declare record kinds, store them in PostgreSQL and read them back.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(flatten)]
    database: DatabaseOverrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the table of every known kind that does not have one yet.
    Init,
    /// Connect and report which kinds already have a table.
    Check,
    /// Create a record from key=value pairs and save it.
    Add(AddArgs),
    /// Print stored records, optionally filtered by key=value pairs.
    List(ListArgs),
}

#[derive(Parser)]
struct AddArgs {
    /// The kind of record (e.g., "rawmediafile").
    kind: String,

    /// Attribute values (e.g., title=Arrival release_year=2016).
    #[arg(value_parser = parse_assignment)]
    values: Vec<(String, String)>,
}

#[derive(Parser)]
struct ListArgs {
    /// The kind of record to list.
    kind: String,

    /// Equality filters (e.g., release_year=2016).
    #[arg(value_parser = parse_assignment)]
    filters: Vec<(String, String)>,
}

fn parse_assignment(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{arg}'")),
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

struct App {
    kinds: BTreeMap<String, Arc<ModelKind>>,
    registry: ModelRegistry,
    engine: PersistenceEngine,
}

impl App {
    fn kind(&self, name: &str) -> anyhow::Result<&Arc<ModelKind>> {
        match self.kinds.get(&name.to_lowercase()) {
            Some(kind) => Ok(kind),
            None => bail!(
                "Unknown kind '{name}'. Known kinds: {}",
                self.kinds.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        }
    }

    fn table_of(&self, kind: &ModelKind) -> anyhow::Result<String> {
        self.registry.validator().validate(kind)?;
        kind.table_name()
            .map(str::to_string)
            .with_context(|| format!("Kind '{}' has no table name", kind.name()))
    }

    async fn init(&self) -> anyhow::Result<()> {
        for (name, kind) in &self.kinds {
            let created = self.registry.ensure_table(kind, &self.engine).await?;
            let table = self.table_of(kind)?;
            if created {
                println!("{name}: created {table}");
            } else {
                println!("{name}: {table} already exists");
            }
        }
        Ok(())
    }

    async fn check(&self) -> anyhow::Result<()> {
        self.engine.connection().connect().await?;

        let mut table = Table::new();
        table
            .set_content_arrangement(ContentArrangement::Dynamic)
            .load_preset(comfy_table::presets::UTF8_FULL)
            .set_header(["Kind", "Table", "Exists"]);
        for (name, kind) in &self.kinds {
            let table_name = self.table_of(kind)?;
            let exists = self.engine.table_exists(&table_name).await?;
            table.add_row([name.as_str(), table_name.as_str(), if exists { "yes" } else { "no" }]);
        }
        println!("{}", self.engine.connection().settings().connection_target());
        println!("{table}");
        Ok(())
    }

    async fn add(&self, args: AddArgs) -> anyhow::Result<()> {
        let kind = self.kind(&args.kind)?;
        let model = self.registry.create(kind)?;

        let rejected: Vec<String> = args
            .values
            .into_iter()
            .filter_map(|(key, value)| model.set(&key, value).err())
            .map(|e| e.to_string())
            .collect();
        if !rejected.is_empty() {
            bail!("Record not saved:\n  {}", rejected.join("\n  "));
        }

        self.registry.ensure_table(kind, &self.engine).await?;
        match model.save(&self.engine).await? {
            Some(id) => println!("Saved {} with id {id}", model.table_name()),
            None => println!("Nothing to save"),
        }
        Ok(())
    }

    async fn list(&self, args: ListArgs) -> anyhow::Result<()> {
        let kind = self.kind(&args.kind)?;
        let table = self.table_of(kind)?;

        let mut filter: ColumnFilter = std::iter::once(ID_COLUMN)
            .chain(kind.attribute_names())
            .map(|column| (column.to_string(), None))
            .collect();
        for (key, raw) in args.filters {
            let value_type = if key == ID_COLUMN {
                ValueType::Int
            } else {
                kind.attribute(&key)
                    .with_context(|| format!("'{key}' is not an attribute of '{}'", kind.name()))?
                    .value_type
            };
            let value = Value::from(raw).coerce_to(value_type)?;
            filter.insert(key, Some(value));
        }

        let rows = self.engine.get(&table, &filter).await?;
        println!("{}", render(&rows));
        Ok(())
    }
}

fn render(rows: &RowSet) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_header(rows.columns.iter().map(Cell::new));
    for row in &rows.rows {
        table.add_row(row.iter().map(|value| match value {
            Value::Null => Cell::new(""),
            other => Cell::new(other),
        }));
    }
    table
}
