use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use rowgraph::entity_catalog::SchemaRegistry;
use rowgraph::sql_generator::{dialect::dialect_by_name, Dialect, SqlGenerator};

/// Rowgraph - print the SQL generated for an aggregate schema
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Schema definition file (YAML)
    #[arg(long)]
    schema: PathBuf,

    /// Entity to generate statements for (default: every entity)
    #[arg(long)]
    entity: Option<String>,

    /// Dialect used for statement generation
    #[arg(long, default_value = "ansi")]
    dialect: String,
}

fn main() {
    // Pick up a local .env before reading RUST_LOG or overrides.
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let Some(dialect) = dialect_by_name(&cli.dialect) else {
        eprintln!("Unknown dialect: {}", cli.dialect);
        process::exit(1);
    };

    let registry = match SchemaRegistry::from_yaml_file(&cli.schema) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Schema error: {e}");
            process::exit(1);
        }
    };

    let entities: Vec<String> = match &cli.entity {
        Some(entity) => vec![entity.clone()],
        None => registry.entity_names().iter().map(|s| s.to_string()).collect(),
    };

    for entity in entities {
        let schema = match registry.get(&entity) {
            Ok(schema) => schema.clone(),
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        };
        if let Err(e) = print_statements(schema, dialect.clone()) {
            eprintln!("Generation error for `{entity}`: {e}");
            process::exit(1);
        }
    }
}

fn print_statements(
    schema: rowgraph::EntitySchema,
    dialect: Arc<dyn Dialect>,
) -> Result<(), rowgraph::sql_generator::SqlBuildError> {
    let name = schema.name.clone();
    let generator = SqlGenerator::new(schema, dialect);

    println!("-- {name}");
    println!(
        "-- single-query eligible: {}",
        generator.single_query_eligible()
    );
    println!("select-aggregate:\n  {}", generator.select_aggregate()?.sql);
    println!(
        "select-aggregate-by-id:\n  {}",
        generator.select_aggregate_by_id()?.sql
    );
    println!("select-by-id:\n  {}", generator.select_by_id()?.sql);
    println!("insert:\n  {}", generator.insert()?.sql);
    println!("update:\n  {}", generator.update()?.sql);
    println!("delete-by-id:\n  {}", generator.delete_by_id()?.sql);
    println!("exists-by-id:\n  {}", generator.exists_by_id()?.sql);
    println!("count-all:\n  {}", generator.count_all()?.sql);

    let plan = generator.aggregate_plan()?;
    for path in &plan.excluded_paths {
        let path = path.split('.').fold(
            rowgraph::AggregatePath::root(),
            |acc, segment| acc.append(segment),
        );
        println!(
            "select-by-path {}:\n  {}",
            path.dot_path(),
            generator.path_select(&path)?.sql
        );
    }
    println!();
    Ok(())
}
