// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Context;
use clap::{Parser, Subcommand};
use roomba::config::settings::Settings;
use roomba::domain::repositories::domain_repository::DomainRepository;
use roomba::domain::services::discovery_service::DiscoveryService;
use roomba::domain::services::normalization_service::NormalizationService;
use roomba::domain::services::seed_service::SeedService;
use roomba::engines::fingerprint::SignatureFingerprinter;
use roomba::engines::reqwest_engine::{ReqwestFetcherFactory, ReqwestProbe};
use roomba::infrastructure::database::connection;
use roomba::infrastructure::repositories::domain_repo_impl::DomainRepositoryImpl;
use roomba::queue::crawl_queue::RegistryCrawlQueue;
use roomba::utils::telemetry;
use roomba::workers::crawl_worker::{CrawlEvent, RecrawlPolicy};
use roomba::workers::probe_worker::{ProbeConfig, ProbePipeline};
use roomba::workers::stats_reporter::StatsReporter;
use roomba::workers::supervisor::{SupervisorConfig, WorkerSupervisor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use migration::{Migrator, MigratorTrait};

#[derive(Parser)]
#[command(name = "roomba")]
#[command(about = "Domain discovery crawler and prober over a shared domain registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawl worker pool until the frontier is exhausted
    Crawl {
        /// Number of worker slots
        #[arg(long)]
        workers: Option<usize>,
        /// Print crawl events as JSON lines on stdout
        #[arg(long)]
        events: bool,
    },

    /// Probe reachability and fingerprint every unprobed domain
    Probe {
        #[arg(long)]
        batch_size: Option<u64>,
        #[arg(long)]
        max_in_flight: Option<usize>,
    },

    /// Import raw domains, one per line ("-" reads stdin)
    Seed { file: PathBuf },

    /// Re-normalize the registry, merging duplicates
    Normalize {
        #[arg(long)]
        batch_size: Option<u64>,
    },

    /// Clear all probe results so the next probe run starts over
    ResetProbes,

    /// Print registry statistics
    Stats {
        /// Repeat every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
}

/// 主函数
///
/// 加载配置、初始化日志、连接数据库并执行迁移，然后分派子命令
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let mut settings = Settings::new().context("failed to load configuration")?;

    // 2. Initialize logging
    telemetry::init_telemetry(&settings.logging);
    info!("Starting roomba...");

    // 3. Connect to database, a failure here aborts startup
    let db = connection::create_pool(&settings.database)
        .await
        .context("failed to connect to the domain registry")?;
    let db = Arc::new(db);

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    let repo = Arc::new(DomainRepositoryImpl::new(db.clone()));

    match cli.command {
        Commands::Crawl { workers, events } => {
            if let Some(workers) = workers {
                settings.crawler.workers = workers;
            }
            settings.validate()?;
            run_crawl(&settings, repo, events).await
        }
        Commands::Probe {
            batch_size,
            max_in_flight,
        } => {
            if let Some(batch_size) = batch_size {
                settings.probe.batch_size = batch_size;
            }
            if let Some(max_in_flight) = max_in_flight {
                settings.probe.max_in_flight = max_in_flight;
            }
            settings.validate()?;
            run_probe(&settings, repo).await
        }
        Commands::Seed { file } => {
            let contents = read_seed_input(&file).await?;
            let report = SeedService::new(repo, settings.maintenance.import_chunk_size)
                .import(contents.lines())
                .await?;
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        Commands::Normalize { batch_size } => {
            let batch_size = batch_size.unwrap_or(settings.maintenance.batch_size);
            let report = NormalizationService::new(repo, batch_size).run().await?;
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        Commands::ResetProbes => {
            let reset = repo.reset_probe_results().await?;
            info!("Cleared probe results on {} domains", reset);
            println!("{}", reset);
            Ok(())
        }
        Commands::Stats { watch } => run_stats(repo, watch).await,
    }
}

async fn run_crawl(
    settings: &Settings,
    repo: Arc<DomainRepositoryImpl>,
    print_events: bool,
) -> anyhow::Result<()> {
    let seeded = SeedService::new(repo.clone(), settings.maintenance.import_chunk_size)
        .ensure_seeds(&settings.crawler.seed_domains)
        .await?;
    if seeded > 0 {
        info!("Registered {} seed domains", seeded);
    }

    let crawler = &settings.crawler;
    let supervisor = WorkerSupervisor::new(
        Arc::new(RegistryCrawlQueue::new(repo.clone())),
        Arc::new(DiscoveryService::new(repo.clone())),
        Arc::new(ReqwestFetcherFactory::new(crawler.fetch_timeout())),
        SupervisorConfig {
            workers: crawler.workers,
            stall_timeout: crawler.stall_timeout(),
            poll_interval: crawler.poll_interval(),
            recrawl: RecrawlPolicy {
                probability: crawler.recrawl_probability,
                sitemap_link_limit: crawler.sitemap_link_limit,
            },
        },
    );

    let printer = print_events.then(|| tokio::spawn(print_events_loop(supervisor.subscribe())));
    let reporter = StatsReporter::new(repo, settings.probe.stats_interval()).start();

    tokio::select! {
        result = supervisor.run() => {
            let report = result?;
            println!("{}", serde_json::to_string(&report)?);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping crawl workers");
        }
    }

    reporter.abort();
    if let Some(printer) = printer {
        printer.abort();
    }
    Ok(())
}

async fn print_events_loop(mut events: broadcast::Receiver<CrawlEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to encode crawl event: {}", e),
            },
            Err(RecvError::Lagged(skipped)) => warn!("Dropped {} crawl events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run_probe(settings: &Settings, repo: Arc<DomainRepositoryImpl>) -> anyhow::Result<()> {
    let probe = &settings.probe;
    let pipeline = ProbePipeline::new(
        repo.clone(),
        Arc::new(ReqwestProbe::new(probe.timeout())?),
        Arc::new(SignatureFingerprinter::new(probe.timeout())?),
        ProbeConfig {
            batch_size: probe.batch_size,
            max_in_flight: probe.max_in_flight,
        },
    );

    let reporter = StatsReporter::new(repo, probe.stats_interval())
        .with_probe_progress(pipeline.progress())
        .start();

    let outcome = tokio::select! {
        result = pipeline.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    reporter.abort();

    match outcome {
        Some(result) => println!("{}", serde_json::to_string(&result?)?),
        None => info!("Shutdown signal received, probe run interrupted"),
    }
    Ok(())
}

async fn run_stats(repo: Arc<DomainRepositoryImpl>, watch: Option<u64>) -> anyhow::Result<()> {
    let Some(secs) = watch else {
        let stats = repo.stats().await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    };

    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let stats = repo.stats().await?;
                println!("{}", stats);
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn read_seed_input(file: &Path) -> anyhow::Result<String> {
    let mut contents = String::new();
    if file.as_os_str() == "-" {
        tokio::io::stdin()
            .read_to_string(&mut contents)
            .await
            .context("failed to read seed domains from stdin")?;
    } else {
        contents = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("failed to read seed file {}", file.display()))?;
    }
    Ok(contents)
}
