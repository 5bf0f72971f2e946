//! Subject — the tracked animal every event refers to.
//!
//! Subjects are created and edited by the CRUD layer; the pipeline only
//! decodes them from the `dogs` collection.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  store::{DocRef, Document},
};

/// Display name used when a subject has no name or cannot be resolved.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A decoded subject profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id: String,
  pub name:       Option<String>,
  pub breed:      Option<String>,
  /// Age in years.
  pub age:        Option<f64>,
  /// Weight in pounds.
  pub weight:     Option<f64>,
  pub sex:        Option<String>,
  /// Users this subject belongs to.
  pub owners:     Vec<DocRef>,
}

impl Subject {
  /// Decode a `dogs` document. Every profile field is optional; owners are
  /// read from `userId` and from the `owners` reference list.
  pub fn from_document(doc: &Document) -> Result<Self> {
    let mut owners = doc.references("owners")?;
    if let Some(primary) = doc.opt_reference("userId")?
      && !owners.contains(&primary)
    {
      owners.insert(0, primary);
    }

    Ok(Self {
      subject_id: doc.id().to_owned(),
      name:       non_empty(doc.opt_str("name")?),
      breed:      non_empty(doc.opt_str("breed")?),
      age:        doc.opt_number("age")?,
      weight:     doc.opt_number("weight")?,
      sex:        non_empty(doc.opt_str("sex")?),
      owners,
    })
  }

  pub fn display_name(&self) -> &str { self.name.as_deref().unwrap_or(UNKNOWN_NAME) }
}

fn non_empty(s: Option<&str>) -> Option<String> {
  s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}
