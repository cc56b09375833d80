//! Admin client for the HoloStore schema catalog.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use holo_schema::{
    AuthenticatedUser, CreateIndexRequest, CreateIndexStatement, IndexProperties, IndexTarget,
    SchemaChangeConfig, SchemaChangeContext, SchemaRegistry, SchemaStore, StaticAuthorizer,
    TableRef, TableSchema,
};
use tracing_subscriber::EnvFilter;

/// Principal treated as superuser when no `--user` is given.
const DEFAULT_USER: &str = "cassandra";

#[derive(Parser)]
#[command(name = "schemactl")]
#[command(about = "Schema catalog admin client for HoloStore", long_about = None)]
struct Args {
    /// Schema catalog file (defaults to HOLO_SCHEMA_STORE_PATH).
    #[arg(long)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List tables with their versions and indexes.
    List,
    /// Print one table schema as JSON.
    Describe {
        #[arg(long)]
        keyspace: String,
        #[arg(long)]
        table: String,
    },
    /// Register a table from a JSON schema file.
    Register {
        #[arg(long)]
        file: PathBuf,
    },
    /// Create a secondary index.
    CreateIndex {
        #[arg(long)]
        keyspace: String,
        #[arg(long)]
        table: String,
        /// Index target: `col`, `values(col)` or `keys(col)`. Repeatable.
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = false)]
        if_not_exists: bool,
        /// Implementation class; makes the index CUSTOM.
        #[arg(long)]
        custom_class: Option<String>,
        /// Custom index option as `key=value`. Repeatable.
        #[arg(long = "option")]
        options: Vec<String>,
        /// Principal issuing the statement.
        #[arg(long, default_value = DEFAULT_USER)]
        user: String,
        /// Extra grant as `user:keyspace[.table]:PERMISSION`. Repeatable.
        #[arg(long = "grant")]
        grants: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("holo_schema=info,warn")),
        )
        .init();

    let args = Args::parse();
    let mut config = SchemaChangeConfig::from_env()?;
    if let Some(store) = args.store {
        config.store_path = store;
    }
    let store = SchemaStore::load_or_init(&config.store_path)
        .with_context(|| format!("open schema store {}", config.store_path.display()))?;

    match args.command {
        Command::List => {
            for schema in store.snapshot() {
                println!("{}", summarize(&schema));
            }
        }
        Command::Describe { keyspace, table } => {
            let table = TableRef::new(keyspace, table);
            let schema = store
                .table_schema(&table)
                .ok_or_else(|| anyhow!("table {table} does not exist"))?;
            println!("{}", serde_json::to_string_pretty(schema.as_ref())?);
        }
        Command::Register { file } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("read table schema {}", file.display()))?;
            let schema: TableSchema = serde_json::from_slice(&data)
                .with_context(|| format!("decode table schema {}", file.display()))?;
            let registered = store.register_table(schema)?;
            println!("registered {}", summarize(&registered));
        }
        Command::CreateIndex {
            keyspace,
            table,
            targets,
            name,
            if_not_exists,
            custom_class,
            options,
            user,
            grants,
        } => {
            let table = TableRef::new(keyspace, table);
            let mut targets = targets
                .iter()
                .map(|raw| IndexTarget::parse(raw))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter();
            let first = targets
                .next()
                .ok_or_else(|| anyhow!("at least one --target is required"))?;
            let mut request = CreateIndexRequest::new(table, first)
                .with_properties(parse_properties(custom_class, &options)?)
                .if_not_exists(if_not_exists);
            for target in targets {
                request = request.with_target(target);
            }
            if let Some(name) = name {
                request = request.named(name);
            }

            let mut authorizer = StaticAuthorizer::new().with_superuser(DEFAULT_USER);
            for grant in &grants {
                authorizer = authorizer.grant_spec(grant)?;
            }
            let (context, _) =
                SchemaChangeContext::for_store(store.clone(), Arc::new(authorizer), config);

            let statement = CreateIndexStatement::new(request);
            match statement
                .execute(&context, &AuthenticatedUser::new(user))
                .await?
            {
                Some(event) => println!("{} {}", event.change, event.table),
                None => println!("unchanged {}", statement.request().table),
            }
        }
    }
    Ok(())
}

fn parse_properties(custom_class: Option<String>, options: &[String]) -> Result<IndexProperties> {
    let mut properties = IndexProperties {
        is_custom: custom_class.is_some(),
        custom_class,
        ..IndexProperties::default()
    };
    for option in options {
        let (key, value) = option
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid --option '{option}' (expected key=value)"))?;
        properties = properties.with_option(key.trim(), value.trim());
    }
    Ok(properties)
}

fn summarize(schema: &TableSchema) -> String {
    let indexes = schema
        .columns
        .iter()
        .filter_map(|column| {
            column.index.as_ref().map(|index| {
                format!(
                    "{}:{}({})",
                    index.name.as_deref().unwrap_or("?"),
                    index.kind.type_name(),
                    column.name
                )
            })
        })
        .collect::<Vec<_>>();
    format!(
        "{} v{} indexes=[{}]",
        schema.table_ref(),
        schema.version,
        indexes.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_make_custom_properties() {
        let properties = parse_properties(
            Some("org.example.SearchIndex".to_string()),
            &["analyzer = standard".to_string()],
        )
        .unwrap();
        assert!(properties.is_custom);
        assert_eq!(
            properties.options.get("analyzer").map(String::as_str),
            Some("standard")
        );
        assert!(parse_properties(None, &["missing-separator".to_string()]).is_err());
    }

    #[test]
    fn create_index_accepts_repeated_targets() {
        let args = Args::try_parse_from([
            "schemactl",
            "create-index",
            "--keyspace",
            "ks",
            "--table",
            "t",
            "--target",
            "keys(m)",
            "--target",
            "v",
            "--if-not-exists",
        ])
        .unwrap();
        let Command::CreateIndex {
            targets,
            if_not_exists,
            user,
            ..
        } = args.command
        else {
            panic!("expected create-index");
        };
        assert_eq!(targets, vec!["keys(m)", "v"]);
        assert!(if_not_exists);
        assert_eq!(user, DEFAULT_USER);
    }
}
