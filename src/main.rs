use cardcache::cache::{CacheStorage, MemoryStorage, SqliteStorage};
use cardcache::config::Config;
use cardcache::router::{ControlMessage, MessageOutcome};
use cardcache::{telemetry, CacheRouter, Destination, HttpFetcher, Request};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cardcache")]
#[command(about = "Offline cache router for the business card generator")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./cardcache.yaml or $XDG_CONFIG_HOME/cardcache/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Use a throwaway in-memory cache instead of the database
  #[arg(long, global = true)]
  memory: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Pre-cache the install manifest into the static cache
  Install,
  /// Delete caches left over from older versions
  Activate,
  /// Route a single request through the cache
  Fetch {
    url: String,
    /// HTTP method; anything but GET bypasses the cache
    #[arg(short = 'X', long, default_value = "GET")]
    method: Method,
    /// Treat the request as a page navigation
    #[arg(long)]
    navigate: bool,
    /// Request destination (document, image, font, script, style, other)
    #[arg(short, long, default_value = "other")]
    destination: Destination,
    /// Write the body here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Deliver a raw control message, e.g. '{"type":"CLEAN_CACHE"}'
  Message { json: String },
  /// Fetch URLs into the dynamic cache
  CacheUrls {
    #[arg(required = true)]
    urls: Vec<String>,
  },
  /// Delete every cache
  Clean,
  /// Activate immediately if installed
  SkipWaiting,
  /// List caches and their entry counts
  Status,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = telemetry::init(&config.logging)?;

  let fetcher = HttpFetcher::new(&config.fetcher_options())?;
  let options = config.router_options()?;

  if args.memory {
    run(CacheRouter::new(MemoryStorage::new(), fetcher, options), args.command).await
  } else {
    let storage = match &config.storage.path {
      Some(path) => SqliteStorage::open_at(path)?,
      None => SqliteStorage::open_default()?,
    };
    run(CacheRouter::new(storage, fetcher, options), args.command).await
  }
}

async fn run<S: CacheStorage + 'static>(
  router: CacheRouter<S, HttpFetcher>,
  command: Command,
) -> Result<()> {
  // Pick up an install made by an earlier run so skip-waiting can activate it
  router.restore()?;

  match command {
    Command::Install => {
      let count = router.install().await?;
      eprintln!(
        "Cached {} manifest entries into {} ({})",
        count,
        router.static_namespace(),
        router.state()
      );
    }
    Command::Activate => {
      let deleted = router.activate()?;
      if deleted.is_empty() {
        eprintln!("No old caches to delete");
      } else {
        eprintln!("Deleted caches: {}", deleted.join(", "));
      }
    }
    Command::Fetch {
      url,
      method,
      navigate,
      destination,
      output,
    } => {
      let url = router.resolve(&url)?;
      let request = Request {
        method,
        url,
        navigate,
        destination,
      };

      let result = router.handle(&request).await?;
      let strategy = result
        .strategy
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());
      eprintln!(
        "{} {} [{} via {}]",
        result.data.status,
        request.url,
        result.source,
        strategy
      );

      match output {
        Some(path) => std::fs::write(&path, &result.data.body)
          .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?,
        None => std::io::stdout().write_all(&result.data.body)?,
      }
    }
    Command::Message { json } => {
      let message = ControlMessage::from_json(&json)?;
      report(router.on_message(message).await?);
    }
    Command::CacheUrls { urls } => {
      report(router.on_message(ControlMessage::CacheUrls(urls)).await?);
    }
    Command::Clean => {
      report(router.on_message(ControlMessage::CleanCache).await?);
    }
    Command::SkipWaiting => {
      report(router.on_message(ControlMessage::SkipWaiting).await?);
    }
    Command::Status => {
      let storage = router.storage();
      let names = storage.namespaces()?;
      if names.is_empty() {
        println!("No caches");
      }
      for name in names {
        println!("{}\t{} entries", name, storage.len(&name)?);
      }
    }
  }

  // Let background revalidations land before exiting
  router.settle().await;
  Ok(())
}

fn report(outcome: MessageOutcome) {
  match outcome {
    MessageOutcome::SkipWaiting { activated: true } => eprintln!("Activated"),
    MessageOutcome::SkipWaiting { activated: false } => {
      eprintln!("Skip-waiting recorded; nothing installed to activate")
    }
    MessageOutcome::Cached(count) => eprintln!("Cached {} URLs", count),
    MessageOutcome::Cleaned(names) => eprintln!("Deleted {} caches", names.len()),
  }
}
