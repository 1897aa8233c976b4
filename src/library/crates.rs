use std::rc::Rc;

use super::{LibraryContext, Track};
use crate::error::Result;

/// Handle to a crate (a "playlist" on v2/v3 schemas)
///
/// Identity is the `(database, id)` pair. The handle holds no row data of
/// its own: every accessor queries the backend, so a handle observes
/// removal of its row on next use, failing with `crate-deleted`.
#[derive(Clone)]
pub struct Crate {
    ctx: Rc<LibraryContext>,
    id: i64,
}

impl Crate {
    pub(crate) fn new(ctx: Rc<LibraryContext>, id: i64) -> Self {
        Self { ctx, id }
    }

    /// Backend-assigned id, unique within the database.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Whether the underlying row still exists.
    pub fn is_valid(&self) -> Result<bool> {
        self.ctx.layer.crate_exists(self.id)
    }

    /// Name of the crate.
    pub fn name(&self) -> Result<String> {
        self.ctx.layer.crate_name(self.id)
    }

    /// Rename the crate. Fails with `crate-invalid-name` when empty or
    /// already taken by a sibling.
    pub fn set_name(&self, name: &str) -> Result<()> {
        self.ctx.layer.set_crate_name(self.id, name)
    }

    /// Parent crate, or `None` at the root.
    pub fn parent(&self) -> Result<Option<Crate>> {
        Ok(self
            .ctx
            .layer
            .crate_parent(self.id)?
            .map(|id| Crate::new(self.ctx.clone(), id)))
    }

    /// Move the crate under a new parent, or to the root. Fails with
    /// `crate-invalid-parent` when the move would create a cycle.
    pub fn set_parent(&self, parent: Option<&Crate>) -> Result<()> {
        self.ctx
            .layer
            .set_crate_parent(self.id, parent.map(Crate::id))
    }

    /// Immediate sub-crates, in stable sibling order.
    pub fn children(&self) -> Result<Vec<Crate>> {
        Ok(self
            .ctx
            .layer
            .crate_children(self.id)?
            .into_iter()
            .map(|id| Crate::new(self.ctx.clone(), id))
            .collect())
    }

    /// Create a sub-crate, appended after its siblings.
    pub fn create_sub_crate(&self, name: &str) -> Result<Crate> {
        let id = self.ctx.layer.create_sub_crate(self.id, name)?;
        Ok(Crate::new(self.ctx.clone(), id))
    }

    /// Create a sub-crate, ordered directly after the given sibling.
    pub fn create_sub_crate_after(&self, name: &str, after: &Crate) -> Result<Crate> {
        let id = self
            .ctx
            .layer
            .create_sub_crate_after(self.id, name, after.id())?;
        Ok(Crate::new(self.ctx.clone(), id))
    }

    /// Tracks in this crate, in crate order.
    pub fn tracks(&self) -> Result<Vec<Track>> {
        Ok(self
            .ctx
            .layer
            .crate_tracks(self.id)?
            .into_iter()
            .map(|id| Track::new(self.ctx.clone(), id))
            .collect())
    }

    /// Add a track to this crate. Adding a track that is already a member
    /// leaves the crate unchanged.
    pub fn add_track(&self, track: &Track) -> Result<()> {
        self.ctx
            .layer
            .add_track_to_crate(self.id, track.id(), false)
    }

    /// Add a track to this crate, failing with `crate-already-exists` if
    /// it is already a member.
    pub fn add_track_unique(&self, track: &Track) -> Result<()> {
        self.ctx.layer.add_track_to_crate(self.id, track.id(), true)
    }

    /// Remove a track from this crate. The track itself is untouched.
    pub fn remove_track(&self, track: &Track) -> Result<()> {
        self.ctx
            .layer
            .remove_track_from_crate(self.id, track.id())
    }

    /// Remove every track from this crate.
    pub fn clear_tracks(&self) -> Result<()> {
        self.ctx.layer.clear_crate_tracks(self.id)
    }
}
