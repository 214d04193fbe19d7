mod auth;
mod backup;
mod config;
mod models;
mod net;
mod pdf;
mod photos;
mod store;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::net::NetworkClient;
use crate::store::{SqliteBackend, Store};
use crate::worker::{ServiceWorker, SqliteCacheStore};

#[derive(Parser, Debug)]
#[command(name = "relato")]
#[command(about = "Offline-first maintenance report tool")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./relato.yaml or $XDG_CONFIG_HOME/relato/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List saved templates
  Templates,
  /// Create a template
  NewTemplate {
    /// OM description
    description: String,
    /// Default activity text
    activity: String,
  },
  /// Delete a template by id
  DeleteTemplate { id: String },
  /// List saved reports
  Reports,
  /// Delete a report by id
  DeleteReport { id: String },
  /// Register the device credential pair and start a session
  Register { username: String, password: String },
  /// Log in against the stored credential pair
  Login { username: String, password: String },
  /// End the current session
  Logout,
  /// Write a JSON backup of templates and reports
  Export {
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Merge a backup file into the local store
  Import {
    /// Backup file to import
    file: PathBuf,
  },
  /// Install the current cache generation and pre-cache critical assets
  Precache,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let data_dir = config.data_dir()?;
  std::fs::create_dir_all(&data_dir)
    .map_err(|e| eyre!("Failed to create data directory {}: {}", data_dir.display(), e))?;

  // Log to a file so stdout stays clean for command output.
  let file_appender = tracing_appender::rolling::never(&data_dir, "relato.log");
  let (writer, _guard) = tracing_appender::non_blocking(file_appender);
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(writer)
    .with_ansi(false)
    .init();

  let backend = SqliteBackend::open_at(&data_dir.join("store.db"))?;
  let store = Store::new(backend);

  match args.command {
    Command::Templates => {
      for template in store.templates() {
        println!("{}  {}", template.id, template.om_description);
      }
    }
    Command::NewTemplate {
      description,
      activity,
    } => {
      let template = models::Template::new(description, activity);
      let id = template.id.clone();
      store.save_template(template)?;
      println!("Template {} created", id);
    }
    Command::DeleteTemplate { id } => {
      store.delete_template(&id)?;
      println!("Template {} deleted", id);
    }
    Command::Reports => {
      for report in store.reports() {
        println!(
          "{}  {}  {}  OM {}",
          report.id, report.date, report.equipment, report.om_number
        );
      }
    }
    Command::DeleteReport { id } => {
      store.delete_report(&id)?;
      println!("Report {} deleted", id);
    }
    Command::Register { username, password } => {
      auth::register(&store, &username, &password)?;
      println!("Registered {}", username);
    }
    Command::Login { username, password } => {
      if auth::login(&store, &username, &password)? {
        println!("Logged in as {}", username);
      } else {
        return Err(eyre!("Invalid username or password"));
      }
    }
    Command::Logout => {
      auth::logout(&store)?;
      println!("Logged out");
    }
    Command::Export { output } => {
      let json = backup::export_backup(&store)?;
      match output {
        Some(path) => {
          std::fs::write(&path, json)
            .map_err(|e| eyre!("Failed to write backup to {}: {}", path.display(), e))?;
          println!("Backup written to {}", path.display());
        }
        None => println!("{}", json),
      }
    }
    Command::Import { file } => {
      let text = std::fs::read_to_string(&file)
        .map_err(|e| eyre!("Failed to read backup {}: {}", file.display(), e))?;
      if backup::import_backup(&store, &text) {
        println!(
          "Backup merged: {} templates, {} reports on device",
          store.templates().len(),
          store.reports().len()
        );
      } else {
        return Err(eyre!("Invalid backup file: {}", file.display()));
      }
    }
    Command::Precache => {
      let cache = SqliteCacheStore::open_at(&data_dir.join("cache.db"))?;
      let mut sw = ServiceWorker::new(
        config.cache.version.clone(),
        config.root_document()?,
        config.precache_manifest()?,
        config.route_policy(),
        cache,
      );

      let client = NetworkClient::new()?;
      sw.install(|request| {
        let client = client.clone();
        async move { client.fetch(request).await }
      })
      .await?;
      sw.activate()?;

      println!("Cache generation {} installed and activated", sw.version());
    }
  }

  Ok(())
}
