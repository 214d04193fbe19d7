//! Collaborator interface for PDF export. Layout is not part of this crate;
//! implementors receive a template+report pair and produce a named artifact.

use color_eyre::Result;

use crate::models::{Report, Template};

/// A rendered document ready to hand off.
#[derive(Debug, Clone)]
pub struct DocumentArtifact {
  pub file_name: String,
  pub bytes: Vec<u8>,
}

/// How an artifact should reach the user: native share when available,
/// direct file download otherwise. Data-only contract for exporter
/// implementations; nothing in this crate delivers artifacts itself.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
  Share,
  Download,
}

/// Renders a report against its template.
pub trait ReportExporter {
  fn export(&self, template: &Template, report: &Report) -> Result<DocumentArtifact>;
}

/// File-name convention for exported reports: OM number plus a sanitized
/// slice of the template description.
pub fn artifact_file_name(template: &Template, report: &Report) -> String {
  let om = if report.om_number.is_empty() {
    "Unidentified"
  } else {
    report.om_number.as_str()
  };
  let description = sanitize_description(&template.om_description);
  format!("Report_OM_{}_{}.pdf", om, description)
}

fn sanitize_description(description: &str) -> String {
  let mut out = String::with_capacity(description.len());
  let mut last_was_underscore = false;
  for c in description.chars().take(80) {
    if c.is_ascii_alphanumeric() {
      out.push(c);
      last_was_underscore = false;
    } else if !last_was_underscore {
      out.push('_');
      last_was_underscore = true;
    }
  }
  out.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::sample_report;

  #[test]
  fn file_name_includes_om_number_and_sanitized_description() {
    let template = Template::new("Troca de rolete - TR 2001KS", "act");
    let report = sample_report("r1");
    let name = artifact_file_name(&template, &report);
    assert_eq!(name, "Report_OM_OM-4411_Troca_de_rolete_TR_2001KS.pdf");
  }

  #[test]
  fn missing_om_number_gets_a_placeholder() {
    let template = Template::new("Desc", "act");
    let mut report = sample_report("r1");
    report.om_number = String::new();
    assert!(artifact_file_name(&template, &report).starts_with("Report_OM_Unidentified_"));
  }
}
