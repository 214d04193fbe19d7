//! Backup codec: portable JSON export of the user data collections and
//! non-destructive merge-on-import.

use chrono::Utc;
use color_eyre::Result;
use tracing::warn;

use crate::models::{BackupEnvelope, BACKUP_VERSION};
use crate::store::{Store, StoreBackend};

/// Snapshot both collections plus a timestamp and format version into one
/// JSON document. Reads the store, mutates nothing.
pub fn export_backup<B: StoreBackend>(store: &Store<B>) -> Result<String> {
  let envelope = BackupEnvelope {
    templates: store.templates(),
    reports: store.reports(),
    backup_date: Utc::now().to_rfc3339(),
    version: BACKUP_VERSION,
  };
  Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Merge a backup into the store.
///
/// Per collection, by id: an incoming item overwrites the on-device item with
/// the same id in place, a new id is appended, and on-device items absent
/// from the backup are kept. Import never deletes. Deliberately not
/// conflict-aware: an older backup's copy wins over a newer on-device edit
/// of the same id.
///
/// Both merged collections are written in a single atomic backend write, so
/// a failed import leaves the store untouched. Returns true only on full
/// success; an invalid envelope (not JSON, or either field not an array of
/// the expected shape) is rejected without mutation.
pub fn import_backup<B: StoreBackend>(store: &Store<B>, text: &str) -> bool {
  let envelope: BackupEnvelope = match serde_json::from_str(text) {
    Ok(envelope) => envelope,
    Err(e) => {
      warn!("Rejected backup: {}", e);
      return false;
    }
  };

  let templates = merge_by_id(store.templates(), envelope.templates, |t| t.id.as_str());
  let reports = merge_by_id(store.reports(), envelope.reports, |r| r.id.as_str());

  match store.replace_user_data(&templates, &reports) {
    Ok(()) => true,
    Err(e) => {
      warn!("Failed to write imported collections: {}", e);
      false
    }
  }
}

/// Merge-by-id union: overwrite in place on id match, append otherwise.
/// Idempotent, and commutative across distinct ids.
fn merge_by_id<T, F>(current: Vec<T>, incoming: Vec<T>, id: F) -> Vec<T>
where
  F: Fn(&T) -> &str,
{
  let mut merged = current;
  for item in incoming {
    match merged.iter().position(|existing| id(existing) == id(&item)) {
      Some(index) => merged[index] = item,
      None => merged.push(item),
    }
  }
  merged
}
