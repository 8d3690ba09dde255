//! Storybook - reader and authoring backend for illustrated children's books.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storybook_lib::{
    config::AppConfig,
    dto::LegacyPageDto,
    reflow::{self, ReflowOptions, DEFAULT_MAX_CHARS},
};

/// Storybook server and tools.
#[derive(Parser)]
#[command(name = "storybook", version, about = "Children's book reader and authoring backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server.
    Serve {
        /// Address to bind the API server.
        #[arg(long, env = "STORYBOOK_BIND", default_value = "127.0.0.1:8080")]
        bind: String,

        /// Data directory for the database and media.
        #[arg(long, env = "STORYBOOK_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Database URL (defaults to a file in the data directory).
        #[arg(long, env = "STORYBOOK_DATABASE_URL")]
        database_url: Option<String>,

        /// Base URL uploaded media is served from.
        #[arg(long, env = "STORYBOOK_PUBLIC_URL", default_value = "/media")]
        public_url: String,

        /// Character budget per page.
        #[arg(long, env = "STORYBOOK_MAX_CHARS", default_value_t = DEFAULT_MAX_CHARS)]
        max_chars: usize,
    },

    /// Repaginate a JSON page list and print the result.
    Reflow {
        /// File holding a JSON array of pages.
        file: PathBuf,

        /// Page the edit happened on.
        #[arg(long, default_value_t = 1)]
        edited_page: usize,

        /// Character budget per page.
        #[arg(long, env = "STORYBOOK_MAX_CHARS", default_value_t = DEFAULT_MAX_CHARS)]
        max_chars: usize,

        /// Let text flow through page 0 as well.
        #[arg(long)]
        include_cover: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storybook=info,storybook_lib=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            data_dir,
            database_url,
            public_url,
            max_chars,
        } => {
            let mut config = match data_dir {
                Some(dir) => AppConfig::new(dir),
                None => AppConfig::default(),
            }
            .with_bind(bind)
            .with_public_url(public_url)
            .with_max_chars(max_chars);
            if let Some(url) = database_url {
                config = config.with_database_url(url);
            }

            tracing::info!(data_dir = %config.data_dir.display(), "Starting storybook server...");
            storybook_lib::run(config).await?;
        }

        Commands::Reflow {
            file,
            edited_page,
            max_chars,
            include_cover,
        } => {
            reflow_file(&file, edited_page, max_chars, include_cover).await?;
        }
    }

    Ok(())
}

async fn reflow_file(file: &Path, edited_page: usize, max_chars: usize, include_cover: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let dtos: Vec<LegacyPageDto> = serde_json::from_str(&raw).context("parsing page list")?;

    let mut pages = dtos
        .into_iter()
        .map(|p| p.into_page(None))
        .collect::<Result<Vec<_>, _>>()?;

    let options = ReflowOptions {
        protect_cover: !include_cover,
        ..ReflowOptions::default()
    }
    .with_max_chars(max_chars);
    let report = reflow::reflow(&mut pages, edited_page, &options);
    tracing::info!(
        passes = report.passes,
        splits = report.splits,
        merges = report.merges,
        pages = pages.len(),
        "reflow finished"
    );

    let out: Vec<LegacyPageDto> = pages.iter().map(LegacyPageDto::from_page).collect();
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
