use sql_chat::config::{database_url_from_env, AppConfig, ConfigOverrides, LlmProvider};
use sql_chat::db::{display_target, PgDatabase};
use sql_chat::llm::LlmClient;
use sql_chat::pipeline::SqlChat;
use sql_chat::schema::DateColumnIndex;
use sql_chat::{logging, web};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "sql-chat")]
#[command(about = "Ask questions about a PostgreSQL database in plain language")]
#[command(version)]
struct Args {
    /// PostgreSQL URL (or set DB_URL env var)
    #[arg(long, global = true)]
    db_url: Option<String>,

    /// Language model provider: gemini or openai (or set LLM_PROVIDER env var)
    #[arg(long, global = true)]
    provider: Option<LlmProvider>,

    /// Model name (or set LLM_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Provider API key (or set GOOGLE_API_KEY / OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Log prompts and generated SQL
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the chat page
    Serve {
        /// Address to listen on (or set BIND_ADDR env var)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Answer one question and print the SQL, the result and the answer
    Ask {
        /// The question in natural language
        question: String,
    },
    /// Print the schema description sent to the model
    Schema,
    /// Print the date-like columns that get cast in date queries
    DateColumns,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();
    logging::init_tracing(args.verbose);

    let bind = match &args.command {
        Commands::Serve { bind } => bind.clone(),
        _ => None,
    };
    let overrides = ConfigOverrides {
        database_url: args.db_url.clone(),
        provider: args.provider,
        api_key: args.api_key.clone(),
        model: args.model.clone(),
        bind_addr: bind,
    };

    match args.command {
        Commands::Schema => print_schema(&overrides).await,
        Commands::DateColumns => print_date_columns(&overrides).await,
        Commands::Ask { question } => {
            let (chat, _) = connect(&overrides).await?;
            ask(&chat, &question).await
        }
        Commands::Serve { .. } => {
            let (chat, config) = connect(&overrides).await?;
            web::serve(&config.bind_addr, Arc::new(chat))
                .await
                .context("HTTP server stopped")
        }
    }
}

async fn connect(overrides: &ConfigOverrides) -> Result<(SqlChat, AppConfig)> {
    let config = AppConfig::from_env_with(overrides)?;
    info!(
        "Connecting to {} (model: {} via {})",
        display_target(&config.database_url),
        config.llm.model,
        config.llm.provider
    );

    let db = PgDatabase::connect(&config.database_url, config.max_connections).await?;
    let llm = LlmClient::from_config(&config.llm);
    let chat = SqlChat::start(Arc::new(db), Arc::new(llm))
        .await
        .context("Failed to build date-column index")?;
    Ok((chat, config))
}

/// Catalog-only commands need the database URL but no model key
async fn connect_database(overrides: &ConfigOverrides) -> Result<PgDatabase> {
    let database_url = database_url_from_env(overrides)?;
    Ok(PgDatabase::connect(&database_url, 1).await?)
}

async fn ask(chat: &SqlChat, question: &str) -> Result<()> {
    let turn = chat.ask(question).await?;

    println!("Generated SQL Query");
    println!("{}\n", turn.sql);
    if turn.executed_sql != turn.sql {
        println!("Executed as");
        println!("{}\n", turn.executed_sql);
    }

    println!("Query Result");
    println!("{}\n", turn.table);

    for notice in &turn.notices {
        eprintln!("[ERROR] {}", notice);
    }

    println!("{}", turn.answer);
    Ok(())
}

async fn print_schema(overrides: &ConfigOverrides) -> Result<()> {
    let db = connect_database(overrides).await?;
    let mut notices = Vec::new();
    let schema = sql_chat::schema::read_schema(&db, &mut notices).await;
    if let Some(notice) = notices.first() {
        anyhow::bail!("{}", notice);
    }
    println!("{}", schema.trim_start());
    Ok(())
}

async fn print_date_columns(overrides: &ConfigOverrides) -> Result<()> {
    let db = connect_database(overrides).await?;
    let index = DateColumnIndex::build(&db).await?;
    if index.is_empty() {
        println!("No date-like columns found");
        return Ok(());
    }
    for (table, columns) in index.tables() {
        println!("{}: {}", table, columns.join(", "));
    }
    Ok(())
}
