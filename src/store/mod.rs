//! Local document store: durable CRUD over the four on-device collections.
//!
//! Each collection persists as one JSON array under its own key; a missing
//! key reads as the empty collection. Mutations are read-modify-write over
//! the whole array, safe only because the process is the single writer.

mod backend;

pub use backend::{MemoryBackend, SqliteBackend, StoreBackend};

use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::models::{Credentials, Report, Template};

pub const KEY_TEMPLATES: &str = "relato_templates";
pub const KEY_REPORTS: &str = "relato_reports";
pub const KEY_CREDENTIALS: &str = "relato_user_creds";
pub const KEY_SESSION: &str = "relato_session_active";

/// Document store service over a key-value backend.
///
/// Constructed once per process and passed where needed; read failures
/// degrade to empty results rather than surfacing to callers.
pub struct Store<B: StoreBackend> {
  backend: B,
}

impl<B: StoreBackend> Store<B> {
  pub fn new(backend: B) -> Self {
    Self { backend }
  }

  /// List all templates, newest first. Absent or corrupt data reads as empty.
  pub fn templates(&self) -> Vec<Template> {
    self.read_collection(KEY_TEMPLATES)
  }

  /// Save a new template. Templates are always prepended; callers never
  /// resave an existing one.
  pub fn save_template(&self, template: Template) -> Result<()> {
    let mut templates = self.templates();
    templates.insert(0, template);
    self.write_collection(KEY_TEMPLATES, &templates)
  }

  /// Delete a template by id. A no-op when the id is absent.
  pub fn delete_template(&self, id: &str) -> Result<()> {
    let mut templates = self.templates();
    templates.retain(|t| t.id != id);
    self.write_collection(KEY_TEMPLATES, &templates)
  }

  /// List all reports, newest first. Absent or corrupt data reads as empty.
  pub fn reports(&self) -> Vec<Report> {
    self.read_collection(KEY_REPORTS)
  }

  /// Save a report: replace in place when the id already exists, otherwise
  /// prepend.
  pub fn save_report(&self, report: Report) -> Result<()> {
    let mut reports = self.reports();
    match reports.iter().position(|r| r.id == report.id) {
      Some(index) => reports[index] = report,
      None => reports.insert(0, report),
    }
    self.write_collection(KEY_REPORTS, &reports)
  }

  /// Delete a report by id. A no-op when the id is absent.
  pub fn delete_report(&self, id: &str) -> Result<()> {
    let mut reports = self.reports();
    reports.retain(|r| r.id != id);
    self.write_collection(KEY_REPORTS, &reports)
  }

  /// Replace both user data collections in one atomic backend write.
  pub fn replace_user_data(&self, templates: &[Template], reports: &[Report]) -> Result<()> {
    let templates_json = serde_json::to_string(templates)?;
    let reports_json = serde_json::to_string(reports)?;
    self
      .backend
      .set_many(&[(KEY_TEMPLATES, templates_json), (KEY_REPORTS, reports_json)])
  }

  /// The registered credential pair, if any.
  pub fn credentials(&self) -> Option<Credentials> {
    let raw = match self.backend.get(KEY_CREDENTIALS) {
      Ok(value) => value?,
      Err(e) => {
        warn!(key = KEY_CREDENTIALS, "Failed to read credentials: {}", e);
        return None;
      }
    };

    match serde_json::from_str(&raw) {
      Ok(creds) => Some(creds),
      Err(e) => {
        warn!(key = KEY_CREDENTIALS, "Corrupt credentials entry: {}", e);
        None
      }
    }
  }

  pub fn set_credentials(&self, credentials: &Credentials) -> Result<()> {
    let json = serde_json::to_string(credentials)?;
    self.backend.set(KEY_CREDENTIALS, &json)
  }

  pub fn remove_credentials(&self) -> Result<()> {
    self.backend.remove(KEY_CREDENTIALS)
  }

  /// Whether a session is currently active.
  pub fn session_active(&self) -> bool {
    matches!(self.backend.get(KEY_SESSION), Ok(Some(value)) if value == "true")
  }

  pub fn set_session(&self) -> Result<()> {
    self.backend.set(KEY_SESSION, "true")
  }

  pub fn clear_session(&self) -> Result<()> {
    self.backend.remove(KEY_SESSION)
  }

  fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
    let raw = match self.backend.get(key) {
      Ok(Some(value)) => value,
      Ok(None) => return Vec::new(),
      Err(e) => {
        warn!(key, "Failed to read collection: {}", e);
        return Vec::new();
      }
    };

    match serde_json::from_str(&raw) {
      Ok(items) => items,
      Err(e) => {
        warn!(key, "Corrupt collection, treating as empty: {}", e);
        Vec::new()
      }
    }
  }

  fn write_collection<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
    let json = serde_json::to_string(items)?;
    self.backend.set(key, &json)
  }
}
