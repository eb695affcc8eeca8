//! Roster entry model
//!
//! An Identity is a registered person. Records are immutable after
//! registration except for deletion; renames never happen, which is why
//! attendance records can safely denormalize the name and role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered person in the roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Unique identifier, stable for the record's lifetime
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Free-form category (e.g. "Student", "Staff")
    pub role: String,

    /// Department or group label
    pub department: String,

    /// Reference image as an opaque base64 text payload; never decoded here
    pub image: String,

    /// When this identity was registered
    pub registered_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity with a fresh id and the current timestamp
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        department: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: role.into(),
            department: department.into(),
            image: image.into(),
            registered_at: Utc::now(),
        }
    }
}
