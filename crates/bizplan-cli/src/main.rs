mod config;
mod server;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use bizplan_core::credentials::generate_secret;
use bizplan_db::pool;

use config::BizplanConfig;

#[derive(Parser)]
#[command(name = "bizplan", about = "AI-assisted business plan generation service")]
struct Cli {
    /// Database URL (overrides BIZPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a bizplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/bizplan")]
        db_url: String,
        /// Gemini API key; plans contain placeholders without one
        #[arg(long)]
        gemini_api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Run the HTTP API server
    Serve {
        /// Address to bind (overrides config file)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Execute `bizplan init`: write the config file.
fn cmd_init(db_url: &str, gemini_api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let token_secret = generate_secret();
    let has_key = gemini_api_key.is_some();

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        auth: config::AuthSection {
            token_secret: token_secret.clone(),
            token_ttl_minutes: 30,
        },
        ai: config::AiSection {
            gemini_api_key,
            ..Default::default()
        },
        server: Default::default(),
        mail: Default::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {}", pool::redact(db_url));
    println!("  auth.token_secret = {}...{}", &token_secret[..8], &token_secret[56..]);
    if !has_key {
        println!("  ai.gemini_api_key is unset; set it or {}", config::GEMINI_API_KEY_ENV);
    }
    println!();
    println!("Next: run `bizplan db-init` to create and migrate the database.");

    Ok(())
}

/// Execute `bizplan db-init`: create the database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = BizplanConfig::resolve(cli_db_url)?;

    println!("Initializing bizplan database...");

    if pool::ensure_database_exists(&resolved.db_config).await? {
        println!("Created database {}.", resolved.db_config.database_name().unwrap_or("?"));
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("bizplan db-init complete.");
    Ok(())
}

async fn cmd_serve(
    cli_db_url: Option<&str>,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut resolved = BizplanConfig::resolve(cli_db_url)?;
    if let Some(bind) = bind {
        resolved.server.bind = bind;
    }
    if let Some(port) = port {
        resolved.server.port = port;
    }

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;
    let result = server::run_serve(db_pool.clone(), resolved).await;
    db_pool.close().await;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            gemini_api_key,
            force,
        } => {
            cmd_init(&db_url, gemini_api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            cmd_serve(cli.database_url.as_deref(), bind, port).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "bizplan", &mut std::io::stdout());
        }
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::Cli;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
