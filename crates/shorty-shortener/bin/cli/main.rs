mod cli;

use crate::cli::{Command, CLI};
use clap::Parser;
use shorty_shortener::{BatchItem, RandomGenerator, ShortenerService, Storage};
use shorty_storage::{open_storage, StorageSettings, WriterRegistry};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Service = ShortenerService<dyn Storage, RandomGenerator>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = CLI::parse();

    info!(
        file_storage_path = %config.file_storage_path.display(),
        database = config.database_dsn.is_some(),
        base_url = %config.base_url,
        "starting shortener"
    );

    let mut settings = StorageSettings::builder()
        .file_storage_path(config.file_storage_path)
        .flush_interval(Duration::from_secs(config.flush_interval_secs))
        .build();
    settings.database_dsn = config.database_dsn;

    let registry = WriterRegistry::new();
    let storage = open_storage(&settings, &registry).await?;
    let service: Service =
        ShortenerService::new(storage.clone(), RandomGenerator::new(), config.base_url);

    let outcome = run(&service, config.command, &config.user).await;
    storage.close().await?;
    outcome
}

async fn run(service: &Service, command: Command, user: &str) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url } => {
            let shortened = service.shorten(&url, user).await?;
            if shortened.already_existed {
                info!("url was already shortened");
            }
            println!("{}", shortened.short_url);
        }
        Command::Batch { items } => {
            let items: Vec<BatchItem> = items
                .into_iter()
                .map(|(correlation_id, original_url)| BatchItem {
                    correlation_id,
                    original_url,
                })
                .collect();
            for result in service.shorten_batch(&items, user).await? {
                println!("{}\t{}", result.correlation_id, result.short_url);
            }
        }
        Command::Resolve { short_id } => {
            println!("{}", service.resolve(&short_id).await?);
        }
        Command::List => {
            for url in service.user_urls(user).await? {
                println!("{}\t{}", url.short_url, url.original_url);
            }
        }
        Command::Delete { short_ids } => {
            service.delete_user_urls(&short_ids, user).await?;
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
        Command::Stats => {
            let stats = service.stats().await?;
            println!("urls: {}\nusers: {}", stats.urls, stats.users);
        }
    }

    Ok(())
}
