use anyhow::{bail, Context, Result};
use clap::Parser;
use kita::core::logging;
use kita::ui::cli::{Cli, Commands};
use kita::{
    AppCache, Config, ContentIndexer, EmbeddingService, ExtractorRegistry, FileWatcher,
    HttpEmbeddingClient, SearchItem, SearchOrchestrator, Store, SystemPlatform,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load(cli.base_dir.clone())?;

    match cli.command {
        Commands::Init => handle_init(&config),
        Commands::Index { paths, workers } => handle_index(&config, &paths, workers).await,
        Commands::Search { query, json } => handle_search(&config, &query, json).await,
        Commands::Apps { filter } => handle_apps(&config, filter.as_deref().unwrap_or("")).await,
        Commands::Launch { name } => handle_launch(&config, &name).await,
        Commands::Open { path } => handle_open(&config, &path).await,
        Commands::Reconcile => handle_reconcile(&config).await,
        Commands::Watch { paths, debounce_ms } => {
            handle_watch(&config, paths, Duration::from_millis(debounce_ms)).await
        }
    }
}

fn handle_init(config: &Config) -> Result<()> {
    println!("Initializing kita...");

    if config.is_initialized() {
        println!("kita is already initialized at: {}", config.base_dir.display());
        return Ok(());
    }

    config.init()?;
    println!("✓ Created configuration directory: {}", config.base_dir.display());
    if let Some(parent) = config.database_path.parent() {
        println!("✓ Created database directory: {}", parent.display());
    }

    println!("\nInitialization complete!");
    println!("Next steps:");
    println!("  1. Start the embedding service at {}", config.embedding_url);
    println!("  2. Index your files: kita index ~/Documents");
    println!("  3. Search: kita search \"quarterly report\"");
    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<Store>> {
    if !config.is_initialized() {
        bail!("kita is not initialized. Run 'kita init' first.");
    }
    let store = Store::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    Ok(Arc::new(store))
}

fn embedding_service(config: &Config) -> Result<Arc<dyn EmbeddingService>> {
    let client = HttpEmbeddingClient::from_config(config)?;
    Ok(Arc::new(client))
}

fn build_indexer(config: &Config, workers: Option<usize>) -> Result<ContentIndexer> {
    let indexer = ContentIndexer::new(
        open_store(config)?,
        Arc::new(ExtractorRegistry::with_defaults()),
        embedding_service(config)?,
    )
    .with_workers(workers.unwrap_or(config.index_workers));
    Ok(indexer)
}

fn app_cache(config: &Config) -> Arc<AppCache> {
    let platform = SystemPlatform::new(config.application_dirs.clone());
    Arc::new(AppCache::new(Arc::new(platform), config.app_cache_ttl))
}

fn build_orchestrator(config: &Config) -> Result<SearchOrchestrator> {
    Ok(SearchOrchestrator::from_config(
        config,
        open_store(config)?,
        embedding_service(config)?,
        app_cache(config),
    ))
}

async fn handle_index(config: &Config, paths: &[PathBuf], workers: Option<usize>) -> Result<()> {
    let indexer = build_indexer(config, workers)?;

    let mut progress = indexer.subscribe();
    let reporter = tokio::spawn(async move {
        while let Ok(update) = progress.recv().await {
            eprint!(
                "\rProcessing: {}/{} ({}%)",
                update.processed, update.total, update.percentage
            );
            if update.processed == update.total {
                eprintln!();
            }
        }
    });

    let summary = indexer.index(paths).await?;
    drop(indexer);
    let _ = reporter.await;

    println!("\nIndexing complete!");
    println!("  Indexed: {} files", summary.files_processed);
    if summary.skipped > 0 {
        println!("  Skipped: {} files (unsupported or empty)", summary.skipped);
    }
    if summary.failed > 0 {
        println!("  Failed:  {} files (see log)", summary.failed);
    }
    Ok(())
}

async fn handle_search(config: &Config, query: &str, json: bool) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let sections = orchestrator.search(query).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
        return Ok(());
    }

    if sections.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    for section in &sections {
        println!("\n{} ({})", section.title, section.items.len());
        for item in &section.items {
            match item {
                SearchItem::App { app } => {
                    let marker = if app.is_running { " [running]" } else { "" };
                    println!("  {}{}", app.name, marker);
                }
                SearchItem::File { file, score } => match score {
                    Some(score) => println!("  {} ({:.2})", file.path, score),
                    None => println!("  {}", file.path),
                },
            }
        }
    }
    Ok(())
}

async fn handle_apps(config: &Config, filter: &str) -> Result<()> {
    let apps = app_cache(config).query(filter).await;
    if apps.is_empty() {
        println!("No applications found");
        return Ok(());
    }
    for app in apps {
        let marker = if app.is_running { " [running]" } else { "" };
        println!("{}{}  {}", app.name, marker, app.path.display());
    }
    Ok(())
}

async fn handle_launch(config: &Config, name: &str) -> Result<()> {
    let cache = app_cache(config);
    let apps = cache.query(name).await;
    let app = apps
        .iter()
        .find(|app| app.name.eq_ignore_ascii_case(name))
        .or_else(|| apps.first())
        .with_context(|| format!("No application matches '{}'", name))?;

    if !cache.launch_or_activate(app).await {
        bail!("Could not open {}", app.name);
    }
    println!("Opened {}", app.name);
    Ok(())
}

async fn handle_open(config: &Config, path: &Path) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let recent = orchestrator.record_open(&path.to_string_lossy()).await?;
    println!("Recorded {} at {}", recent.path, recent.last_clicked);
    Ok(())
}

async fn handle_reconcile(config: &Config) -> Result<()> {
    let indexer = build_indexer(config, None)?;
    let removed = indexer.reconcile().await?;
    println!("Removed {} missing file(s) from the index", removed);
    Ok(())
}

async fn handle_watch(config: &Config, paths: Vec<PathBuf>, debounce: Duration) -> Result<()> {
    let indexer = Arc::new(build_indexer(config, None)?);

    println!("Indexing before watching...");
    let summary = indexer.index(&paths).await?;
    println!("✓ Indexed {} files", summary.files_processed);

    println!("Press Ctrl+C to stop watching...\n");
    let watcher = FileWatcher::new(indexer, paths, debounce);
    watcher
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
