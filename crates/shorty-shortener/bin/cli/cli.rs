use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FLUSH_INTERVAL_SECS_ENV: &str = "FLUSH_INTERVAL_SECS";
pub const USER_ID_ENV: &str = "SHORTENER_USER_ID";

pub const DEFAULT_FILE_STORAGE_PATH: &str = "urls.json";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Parser)]
#[command(name = "shortener", about = "Shorten URLs and manage stored mappings")]
pub struct CLI {
    /// Snapshot file; an empty value keeps everything in memory.
    #[arg(long, env = FILE_STORAGE_PATH_ENV, default_value = DEFAULT_FILE_STORAGE_PATH)]
    pub file_storage_path: PathBuf,

    /// PostgreSQL connection string; takes precedence over the snapshot file.
    #[arg(long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = FLUSH_INTERVAL_SECS_ENV,
        default_value_t = DEFAULT_FLUSH_INTERVAL_SECS,
    )]
    pub flush_interval_secs: u64,

    /// Owner the command acts on behalf of.
    #[arg(long, env = USER_ID_ENV, default_value = shorty_core::SYSTEM_OWNER)]
    pub user: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one URL, reusing its short URL if it already has one.
    Shorten { url: String },
    /// Shorten several URLs given as CORRELATION_ID=URL pairs.
    Batch {
        #[arg(required = true, value_parser = parse_batch_item)]
        items: Vec<(String, String)>,
    },
    /// Print the URL a short id redirects to.
    Resolve { short_id: String },
    /// List the URLs created by the current user.
    List,
    /// Delete short ids owned by the current user.
    Delete {
        #[arg(required = true)]
        short_ids: Vec<String>,
    },
    /// Check that the storage backend is reachable.
    Ping,
    /// Print the number of stored URLs and distinct users.
    Stats,
}

fn parse_batch_item(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((id, url)) if !id.is_empty() => Ok((id.to_string(), url.to_string())),
        _ => Err(format!("expected CORRELATION_ID=URL, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_items() {
        assert_eq!(
            parse_batch_item("a=https://x.com/?q=1"),
            Ok(("a".to_string(), "https://x.com/?q=1".to_string()))
        );
        assert!(parse_batch_item("https://x.com").is_err());
        assert!(parse_batch_item("=https://x.com").is_err());
    }

    #[test]
    fn defaults_apply() {
        let cli = CLI::try_parse_from(["shortener", "stats"]).unwrap();

        assert_eq!(cli.file_storage_path, PathBuf::from(DEFAULT_FILE_STORAGE_PATH));
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.flush_interval_secs, DEFAULT_FLUSH_INTERVAL_SECS);
        assert!(matches!(cli.command, Command::Stats));
    }

    #[test]
    fn batch_requires_items() {
        assert!(CLI::try_parse_from(["shortener", "batch"]).is_err());
    }
}
