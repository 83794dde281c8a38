//! Naming of transient customisation notes.

use uuid::Uuid;

use crate::types::ServerId;

/// Builds a unique note name. The priority prefix orders notes when the
/// provider applies them; the random suffix avoids clashing with notes left
/// over from earlier runs against the same server.
#[must_use]
pub fn note_name(priority: u8, server_id: &ServerId) -> String {
    format!("_{priority:02}_{server_id}_{}__", Uuid::new_v4().simple())
}
