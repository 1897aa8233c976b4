use std::rc::Rc;

use super::LibraryContext;
use crate::error::Result;
use crate::model::TrackSnapshot;

/// Handle to a track
///
/// Identity is the `(database, id)` pair. Row data is read on demand; a
/// handle whose row has been removed fails with `track-deleted` on next
/// use.
#[derive(Clone)]
pub struct Track {
    ctx: Rc<LibraryContext>,
    id: i64,
}

impl Track {
    pub(crate) fn new(ctx: Rc<LibraryContext>, id: i64) -> Self {
        Self { ctx, id }
    }

    /// Backend-assigned id, unique within the database.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Whether the underlying row still exists.
    pub fn is_valid(&self) -> Result<bool> {
        self.ctx.layer.track_exists(self.id)
    }

    /// Materialise a detached snapshot of the track, reading every column
    /// and decoding every analysis BLOB.
    pub fn snapshot(&self) -> Result<TrackSnapshot> {
        self.ctx.layer.track_snapshot(self.id)
    }

    /// Apply a snapshot in a single transaction, rewriting the row and
    /// all BLOBs atomically. Missing optional fields clear the
    /// corresponding columns.
    pub fn update(&self, snapshot: &TrackSnapshot) -> Result<()> {
        self.ctx.layer.update_track(self.id, snapshot)
    }
}
