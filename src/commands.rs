use exn::ResultExt;
use futures::StreamExt;
use spotpass_client::Client;
use spotpass_config::Config;
use spotpass_crawl::error::ErrorKind as CrawlErrorKind;
use spotpass_crawl::{Candidate, Context, CrawlEvent, Discovery, default_run_name, discover_all, resolve_title_ids};
use spotpass_queue::{Database, Repository};
use spotpass_registry::{Locale, LocaleMatrix, MergeSummary, Platform, Registry};
use spotpass_storage::backend::LocalBackend;
use spotpass_storage::{BackendHandle, Ledger};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{ErrorKind, Result};

fn platforms(platform: Option<Platform>) -> Vec<Platform> {
    platform.map_or(Platform::ALL.to_vec(), |p| vec![p])
}

async fn open_registry(config: &Config) -> Result<Registry> {
    Registry::open(&config.registry.path).await.or_raise(|| ErrorKind::Registry)
}

async fn open_queue(config: &Config) -> Result<Repository> {
    let db = Database::connect(&config.queue.path).await.or_raise(|| ErrorKind::Queue)?;
    Ok(Repository::new(&db, config.queue.claim_lease()))
}

fn client(config: &Config) -> Result<Client> {
    Client::new(&config.network, &config.endpoints).or_raise(|| ErrorKind::Client)
}

fn locales(config: &Config) -> Result<LocaleMatrix> {
    config.locales.matrix().or_raise(|| ErrorKind::Config)
}

pub async fn ingest(config: &Config, platform: Platform, paths: &[PathBuf]) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let mut total = MergeSummary::default();
    for path in paths {
        total += spotpass_crawl::ingest(&mut registry, platform, path)
            .await
            .or_raise(|| ErrorKind::Command("ingest"))?;
    }
    println!("{} new apps, {} new tasks", total.new_apps, total.new_tasks);
    Ok(())
}

pub async fn discover(config: &Config, platform: Option<Platform>, apps: &[String], tasks: &[String]) -> Result<()> {
    if !apps.is_empty() && platform.is_none() {
        exn::bail!(ErrorKind::Argument("--app requires --platform".to_string()));
    }
    let registry = open_registry(config).await?;
    let mut candidates = Vec::new();
    for platform in platforms(platform) {
        let app_ids: Vec<String> = match apps.is_empty() {
            true => registry.apps_for(platform).map(|app| app.app_id.clone()).collect(),
            false => apps.to_vec(),
        };
        let names = match tasks.is_empty() {
            true => config.discovery.candidates(platform),
            false => tasks,
        };
        for app_id in &app_ids {
            candidates.extend(names.iter().map(|task| Candidate::new(platform, app_id, task)));
        }
    }
    tracing::info!(candidates = candidates.len(), "Starting discovery");

    let client = client(config)?;
    let registry = Mutex::new(registry);
    let results = discover_all(&client, &registry, &locales(config)?, candidates, config.network.concurrency)
        .await
        .or_raise(|| ErrorKind::Command("discover"))?;

    let mut found = 0;
    for (candidate, discovery) in &results {
        if let Discovery::Found(locale) = discovery {
            found += 1;
            println!("{} {} {} (first served in {locale})", candidate.platform, candidate.app_id, candidate.task);
        }
    }
    println!("{found} new tasks from {} candidates", results.len());
    Ok(())
}

pub async fn title_ids(config: &Config, platform: Option<Platform>) -> Result<()> {
    let client = client(config)?;
    let registry = Mutex::new(open_registry(config).await?);
    let summary = resolve_title_ids(&client, &registry, &locales(config)?, platform, config.network.concurrency)
        .await
        .or_raise(|| ErrorKind::Command("title-ids"))?;
    println!("{} title ids found, {} unknown", summary.known, summary.unknown);
    Ok(())
}

pub async fn build(config: &Config) -> Result<()> {
    let registry = open_registry(config).await?;
    let queue = open_queue(config).await?;
    let created = queue.build(&registry, &locales(config)?).await.or_raise(|| ErrorKind::Command("build"))?;
    println!("{created} work items added");
    Ok(())
}

pub async fn crawl(config: &Config, platform: Option<Platform>, run: Option<String>) -> Result<()> {
    let run = run.unwrap_or_else(default_run_name);
    let mut components = Path::new(&run).components();
    if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
        exn::bail!(ErrorKind::Argument(format!("run name `{run}` must be a single directory name")));
    }

    let root = std::path::absolute(&config.archive.root).or_raise(|| ErrorKind::Archive)?;
    let backend: BackendHandle = Arc::new(LocalBackend::new("archive", &root).or_raise(|| ErrorKind::Archive)?);
    let ledger = Ledger::open(backend.clone(), &config.archive.ledger).await.or_raise(|| ErrorKind::Archive)?;
    let ctx = Context {
        client: client(config)?,
        backend,
        ledger,
        queue: open_queue(config).await?,
        run,
        concurrency: config.network.concurrency,
        batch_size: config.queue.batch_size,
    };

    for platform in platforms(platform) {
        crawl_platform(&ctx, platform).await?;
    }
    Ok(())
}

async fn crawl_platform(ctx: &Context, platform: Platform) -> Result<()> {
    let (mut items, mut fetched, mut failed, mut errored) = (0, 0, 0, 0);
    let mut events = std::pin::pin!(spotpass_crawl::crawl(ctx, platform));
    while let Some(event) = events.next().await {
        match event {
            Ok(CrawlEvent::Started) => tracing::info!(%platform, run = %ctx.run, "Crawl started"),
            Ok(CrawlEvent::Batch(size)) => tracing::debug!(%platform, size, "Claimed batch"),
            Ok(CrawlEvent::Crawled(crawled)) => {
                items += 1;
                fetched += crawled.fetched();
                failed += crawled.failed();
            },
            Ok(CrawlEvent::Complete) => tracing::info!(%platform, items, "Crawl complete"),
            Err(err) if matches!(&*err, CrawlErrorKind::Item(_)) => {
                errored += 1;
                tracing::error!("{err:?}");
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Command("crawl")),
        }
    }
    println!("{platform}: {items} items crawled, {fetched} files archived, {failed} files failed, {errored} items errored");
    Ok(())
}

pub async fn urls(
    config: &Config,
    platform: Platform,
    app_id: &str,
    task: &str,
    country: &str,
    language: &str,
) -> Result<()> {
    let locale = Locale::new(country, language).or_raise(|| ErrorKind::Argument(format!("{country}/{language}")))?;
    let client = client(config)?;
    let plan = spotpass_crawl::plan(&client, client.endpoints(), platform, app_id, task, &locale)
        .await
        .or_raise(|| ErrorKind::Command("urls"))?;

    println!("{}", plan.manifest);
    let Some(files) = plan.files else {
        println!("  (no manifest served for {locale})");
        return Ok(());
    };
    for (filename, urls) in files {
        println!("  {filename}");
        for url in urls {
            println!("    {url}");
        }
    }
    Ok(())
}

pub async fn status(config: &Config) -> Result<()> {
    let queue = open_queue(config).await?;
    for platform in Platform::ALL {
        let stats = queue.stats(platform).await.or_raise(|| ErrorKind::Command("status"))?;
        println!(
            "{platform}: {} total, {} processed, {} pending, {} claimed, {} failed files",
            stats.total,
            stats.processed,
            stats.pending(),
            stats.claimed,
            stats.failed_files
        );
    }
    Ok(())
}
