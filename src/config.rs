use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::worker::RoutePolicy;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
  /// Override for the data directory (store, cache, logs).
  pub data_dir: Option<PathBuf>,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Tag of the current cache generation. Bumped on every deploy.
  #[serde(default = "default_version")]
  pub version: String,
  /// App shell entry point; also the offline navigation fallback.
  #[serde(default = "default_root_document")]
  pub root_document: String,
  /// Critical assets pre-cached at install, beyond the root document.
  #[serde(default = "default_precache")]
  pub precache: Vec<String>,
  /// Hostname fragments routed cache-first.
  #[serde(default = "default_cdn_hosts")]
  pub cdn_hosts: Vec<String>,
  /// Path extensions routed cache-first.
  #[serde(default = "default_image_extensions")]
  pub image_extensions: Vec<String>,
}

fn default_version() -> String {
  "relato-v1".to_string()
}

fn default_root_document() -> String {
  "https://localhost:8080/index.html".to_string()
}

fn default_precache() -> Vec<String> {
  vec![
    "https://localhost:8080/manifest.json".to_string(),
    "https://cdn.tailwindcss.com".to_string(),
  ]
}

fn default_cdn_hosts() -> Vec<String> {
  vec![
    "esm.sh".to_string(),
    "tailwindcss".to_string(),
    "google".to_string(),
  ]
}

fn default_image_extensions() -> Vec<String> {
  ["png", "jpg", "jpeg", "gif", "webp", "svg"]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      version: default_version(),
      root_document: default_root_document(),
      precache: default_precache(),
      cdn_hosts: default_cdn_hosts(),
      image_extensions: default_image_extensions(),
    }
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided (missing file is an error)
  /// 2. ./relato.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/relato/config.yaml
  ///
  /// Built-in defaults apply when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("relato.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("relato").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// The data directory for the store, cache, and logs.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("relato"))
  }

  pub fn route_policy(&self) -> RoutePolicy {
    RoutePolicy::new(
      self.cache.cdn_hosts.clone(),
      self.cache.image_extensions.clone(),
    )
  }

  pub fn root_document(&self) -> Result<Url> {
    Url::parse(&self.cache.root_document)
      .map_err(|e| eyre!("Invalid root document URL {}: {}", self.cache.root_document, e))
  }

  /// Full pre-cache manifest: the root document plus the configured assets.
  pub fn precache_manifest(&self) -> Result<Vec<Url>> {
    let mut manifest = vec![self.root_document()?];
    for raw in &self.cache.precache {
      let url = Url::parse(raw).map_err(|e| eyre!("Invalid pre-cache URL {}: {}", raw, e))?;
      manifest.push(url);
    }
    Ok(manifest)
  }
}
