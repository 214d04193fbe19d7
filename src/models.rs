//! Domain types for templates, execution reports, photos, and backups.
//!
//! Serde field names use the camelCase wire form so stored JSON and backup
//! files remain interchangeable across devices.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reusable report skeleton: a fixed OM description plus default activity text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
  pub id: String,
  pub om_description: String,
  pub activity_executed: String,
  /// Creation time in unix milliseconds.
  pub created_at: i64,
}

impl Template {
  /// Create a template with a fresh globally-unique id.
  pub fn new(om_description: impl Into<String>, activity_executed: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      om_description: om_description.into(),
      activity_executed: activity_executed.into(),
      created_at: Utc::now().timestamp_millis(),
    }
  }
}

/// A photo attached to a report. The `uri` is a self-contained encoded
/// payload (data URI), never a network reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PhotoRepr")]
pub struct Photo {
  pub uri: String,
  pub caption: String,
}

/// Accepts both the current object form and the legacy bare-string form.
///
/// Older stores persisted photos as plain URI strings. Normalization happens
/// once here, at the serde boundary, so nothing downstream ever sees the
/// legacy shape.
#[derive(Deserialize)]
#[serde(untagged)]
enum PhotoRepr {
  Current {
    uri: String,
    #[serde(default)]
    caption: String,
  },
  Legacy(String),
}

impl From<PhotoRepr> for Photo {
  fn from(repr: PhotoRepr) -> Self {
    match repr {
      PhotoRepr::Current { uri, caption } => Photo { uri, caption },
      PhotoRepr::Legacy(uri) => Photo {
        uri,
        caption: String::new(),
      },
    }
  }
}

/// Aliases keep backups written with the Portuguese wire values importable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityType {
  #[serde(alias = "Preventiva")]
  Preventive,
  #[serde(alias = "Corretiva")]
  Corrective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
  A,
  B,
  C,
  D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkCenter {
  SC108HH,
  SC118HH,
  SC103HH,
  SC105HH,
  SC117HH,
}

/// One filled execution record tied to a template.
///
/// `activity_executed` holds the user-edited text for corrective work; for
/// preventive work the template's canonical text stays authoritative and the
/// field is left unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
  pub id: String,
  pub template_id: String,
  pub date: String,
  pub equipment: String,
  pub om_number: String,
  pub activity_type: ActivityType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub activity_executed: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub observations: Option<String>,
  pub start_time: String,
  pub end_time: String,
  pub iamo_deviation: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub iamo_period: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub iamo_reason: Option<String>,
  pub is_finished: bool,
  pub has_pending: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pending_description: Option<String>,
  pub team: Team,
  pub work_center: WorkCenter,
  pub technicians: String,
  #[serde(default)]
  pub photos: Vec<Photo>,
}

impl Report {
  /// Append a photo at the end of the display order.
  pub fn push_photo(&mut self, photo: Photo) {
    self.photos.push(photo);
  }

  /// Replace a photo's payload in place, keeping its list position.
  /// Returns false if the index is out of bounds.
  pub fn replace_photo_uri(&mut self, index: usize, uri: impl Into<String>) -> bool {
    match self.photos.get_mut(index) {
      Some(photo) => {
        photo.uri = uri.into();
        true
      }
      None => false,
    }
  }
}

/// The single local credential pair. Stored plaintext on-device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

/// Current backup format version.
pub const BACKUP_VERSION: u32 = 1;

/// Portable snapshot of the user data collections. Constructed on export,
/// consumed on import, never persisted itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEnvelope {
  pub templates: Vec<Template>,
  pub reports: Vec<Report>,
  #[serde(default)]
  pub backup_date: String,
  #[serde(default)]
  pub version: u32,
}

/// Test fixture shared across module tests.
#[cfg(test)]
pub(crate) fn sample_report(id: &str) -> Report {
  Report {
    id: id.to_string(),
    template_id: "t1".to_string(),
    date: "2026-08-30".to_string(),
    equipment: "CONVEYOR-07".to_string(),
    om_number: "OM-4411".to_string(),
    activity_type: ActivityType::Preventive,
    activity_executed: None,
    observations: None,
    start_time: "08:00".to_string(),
    end_time: "11:30".to_string(),
    iamo_deviation: false,
    iamo_period: None,
    iamo_reason: None,
    is_finished: true,
    has_pending: false,
    pending_description: None,
    team: Team::A,
    work_center: WorkCenter::SC108HH,
    technicians: "J. Silva".to_string(),
    photos: Vec::new(),
  }
}
