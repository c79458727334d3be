use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

use feedsched::config::Config;
use feedsched::scheduler::{self, Scheduler};
use feedsched::storage::{Database, DatabaseError, JobList};

/// Get the config directory path (~/.config/feedsched/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedsched"))
}

#[derive(Parser, Debug)]
#[command(name = "feedsched", about = "Pick the next feeds to refresh")]
struct Args {
    /// Config file (default: ~/.config/feedsched/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database holding feeds and entries
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Override the configured batch size
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Produce a manual-refresh batch for this user instead of a global batch
    #[arg(long, value_name = "ID", conflicts_with = "watch")]
    user: Option<i64>,

    /// Keep producing global batches at the configured polling frequency
    #[arg(long)]
    watch: bool,

    /// Print jobs as JSON lines
    #[arg(long)]
    json: bool,
}

fn print_jobs(jobs: &JobList, json: bool) -> Result<()> {
    for job in jobs {
        if json {
            println!("{}", serde_json::to_string(job)?);
        } else {
            println!("feed={} user={}", job.feed_id, job.user_id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let policy = config.policy().context("Invalid [policy] section")?;
    let batch_size = args.batch_size.unwrap_or(config.batch_size);

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("feeds.db"));
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let scheduler = Scheduler::new(db, policy);

    if let Some(user_id) = args.user {
        let jobs = scheduler
            .new_user_batch(user_id, batch_size)
            .await
            .context("Failed to produce user batch")?;
        return print_jobs(&jobs, args.json);
    }

    if !args.watch {
        let jobs = scheduler
            .new_batch(batch_size)
            .await
            .context("Failed to produce batch")?;
        return print_jobs(&jobs, args.json);
    }

    let frequency = config.polling_frequency();
    let (queue_tx, mut queue_rx) = mpsc::channel::<JobList>(8);
    let producer = tokio::spawn(scheduler::run(scheduler, frequency, batch_size, queue_tx));

    loop {
        tokio::select! {
            batch = queue_rx.recv() => match batch {
                Some(jobs) => print_jobs(&jobs, args.json)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    // The loop only notices a closed queue on its next tick
    producer.abort();
    Ok(())
}
