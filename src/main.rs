use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use managed_query::config::ResolverConfig;
use managed_query::db::Database;
use managed_query::demo;
use managed_query::manager::{Args, Step};
use managed_query::models::Value;

#[derive(Parser)]
#[command(name = "mq")]
#[command(about = "Run managed query chains against the demonstration schema")]
struct Cli {
    /// SQLite database file (in-memory when omitted)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Resolver config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the demo data and run the reference scenario
    Demo,
    /// Run a chain of operations, e.g. `mq call Person older_than:18 younger_than:40`
    Call {
        /// Entity to query (Person, Student, Exam, Book)
        entity: String,
        /// Steps as `name[:arg,...]`; `key=value` arguments are keywords
        steps: Vec<String>,
    },
    /// List the operations callable on an entity
    Operations { entity: String },
}

/// Initialize tracing on stderr so stdout stays clean JSON
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "managed_query=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<Database> {
    let Some(path) = path else {
        return Ok(demo::open_seeded()?);
    };

    let db = Database::open(&path, demo::schema())
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    db.create_all()?;
    if db.session().query(&demo::BOOK).count()? == 0 {
        tracing::info!("Seeding demo data into {}", path.display());
        demo::seed(&db)?;
    }
    Ok(db)
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ResolverConfig> {
    match path {
        Some(path) => ResolverConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ResolverConfig::load_default()?),
    }
}

fn parse_value(raw: &str) -> Value {
    if let Ok(v) = raw.parse::<i64>() {
        return Value::Integer(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return Value::Real(v);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::Text(raw.to_string()),
    }
}

/// `older_than:18` → ("older_than", [18]); `filter_by:age=25` → keyword age=25.
fn parse_step(step: &str) -> (&str, Args) {
    let (name, raw_args) = step.split_once(':').unwrap_or((step, ""));
    let mut args = Args::new();
    for raw in raw_args.split(',').filter(|s| !s.is_empty()) {
        args = match raw.split_once('=') {
            Some((key, value)) => args.kwarg(key, parse_value(value)),
            None => args.arg(parse_value(raw)),
        };
    }
    (name, args)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config)?;
    let db = open_database(cli.db)?;
    let resolver = demo::resolver(config)?;
    let session = demo::managed_session(&db, resolver)?;

    match cli.command {
        Commands::Demo => {
            let adults = session
                .query(&demo::PERSON)
                .call("older_than", managed_query::args![18])?
                .call("younger_than", managed_query::args![40])?
                .rows()?;
            println!("Person.older_than(18).younger_than(40):");
            print_json(&adults)?;

            let students = session
                .query(&demo::STUDENT)
                .call("older_than", managed_query::args![18])?
                .rows()?;
            println!("Student.older_than(18):");
            print_json(&students)?;

            let public_books = session
                .query(&demo::BOOK)
                .call("is_book_public", Args::new())?
                .call("count", Args::new())?;
            println!("Book.is_book_public().count():");
            print_json(&public_books.into_terminal())?;

            match session
                .query(&demo::BOOK)
                .call("older_than", managed_query::args![5])
            {
                Err(err) => println!("Book.older_than(5): {}", err),
                Ok(_) => anyhow::bail!("Book.older_than(5) unexpectedly resolved"),
            }
        }
        Commands::Call { entity, steps } => {
            let entity = db.schema().entity(&entity)?;

            let mut step = Step::Query(session.query(entity));
            for raw in &steps {
                let (name, args) = parse_step(raw);
                step = step.call(name, args)?;
            }

            match step {
                Step::Query(query) => print_json(&query.all()?)?,
                Step::Terminal(terminal) => print_json(&terminal)?,
            }
        }
        Commands::Operations { entity } => {
            let entity = db.schema().entity(&entity)?;
            for name in session.query(entity).operations() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
