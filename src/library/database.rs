use std::path::Path;
use std::rc::Rc;

use super::{Crate, LibraryContext, Track};
use crate::error::Result;
use crate::model::TrackSnapshot;
use crate::schema::Schema;
use crate::table::InformationRow;

/// An open Engine database
///
/// Exclusively owns the backend connection. Crate and track handles
/// obtained from it share that connection and keep it open for as long as
/// any of them is alive. A `Database` must not be shared between threads
/// without external mutual exclusion; separate databases may be driven
/// from separate threads freely.
pub struct Database {
    ctx: Rc<LibraryContext>,
}

impl Database {
    pub(crate) fn new(ctx: Rc<LibraryContext>) -> Self {
        Self { ctx }
    }

    /// Directory this database lives in. Empty for temporary databases.
    pub fn directory(&self) -> &Path {
        &self.ctx.directory
    }

    /// Schema of the database.
    pub fn schema(&self) -> Schema {
        self.ctx.schema
    }

    /// Persisted UUID of the database.
    pub fn uuid(&self) -> Result<String> {
        Ok(self.ctx.layer.information()?.uuid)
    }

    /// The single row of the `Information` table.
    pub fn information(&self) -> Result<InformationRow> {
        self.ctx.layer.information()
    }

    /// Structurally verify the database against its schema: table set,
    /// column names, required triggers, and the declared schema version.
    pub fn verify(&self) -> Result<()> {
        let information = self.ctx.layer.information()?;
        let declared = (
            information.schema_version_major,
            information.schema_version_minor,
            information.schema_version_patch,
        );
        if declared != self.ctx.schema.version_tuple() {
            return Err(crate::error::Error::DatabaseInconsistency(format!(
                "Information declares schema {}.{}.{}, expected {}",
                declared.0, declared.1, declared.2, self.ctx.schema
            )));
        }
        self.ctx.schema.verify(self.ctx.layer.storage())
    }

    /// Update the current played indicator in the `Information` table.
    pub fn update_current_played_indicator(&self, played_indicator: i64) -> Result<()> {
        self.ctx.layer.update_current_played_indicator(played_indicator)
    }

    /// All crates in the database, in id order.
    pub fn crates(&self) -> Result<Vec<Crate>> {
        Ok(self
            .ctx
            .layer
            .list_crates()?
            .into_iter()
            .map(|id| Crate::new(self.ctx.clone(), id))
            .collect())
    }

    /// Crates with no parent, in stable sibling order.
    pub fn root_crates(&self) -> Result<Vec<Crate>> {
        Ok(self
            .ctx
            .layer
            .root_crates()?
            .into_iter()
            .map(|id| Crate::new(self.ctx.clone(), id))
            .collect())
    }

    /// Look up a crate by id.
    pub fn crate_by_id(&self, id: i64) -> Result<Option<Crate>> {
        Ok(self
            .ctx
            .layer
            .crate_exists(id)?
            .then(|| Crate::new(self.ctx.clone(), id)))
    }

    /// All crates carrying the given name, anywhere in the tree.
    pub fn crates_by_name(&self, name: &str) -> Result<Vec<Crate>> {
        Ok(self
            .ctx
            .layer
            .crates_by_name(name)?
            .into_iter()
            .map(|id| Crate::new(self.ctx.clone(), id))
            .collect())
    }

    /// Create a crate at the root level, appended after its siblings.
    pub fn create_root_crate(&self, name: &str) -> Result<Crate> {
        let id = self.ctx.layer.create_root_crate(name)?;
        Ok(Crate::new(self.ctx.clone(), id))
    }

    /// Create a crate at the root level, ordered directly after the given
    /// sibling.
    pub fn create_root_crate_after(&self, name: &str, after: &Crate) -> Result<Crate> {
        let id = self.ctx.layer.create_root_crate_after(name, after.id())?;
        Ok(Crate::new(self.ctx.clone(), id))
    }

    /// All tracks in the database, in id order.
    pub fn tracks(&self) -> Result<Vec<Track>> {
        Ok(self
            .ctx
            .layer
            .list_tracks()?
            .into_iter()
            .map(|id| Track::new(self.ctx.clone(), id))
            .collect())
    }

    /// Look up a track by id.
    pub fn track_by_id(&self, id: i64) -> Result<Option<Track>> {
        Ok(self
            .ctx
            .layer
            .track_exists(id)?
            .then(|| Track::new(self.ctx.clone(), id)))
    }

    /// All tracks bound to the given library-relative path.
    pub fn tracks_by_relative_path(&self, relative_path: &str) -> Result<Vec<Track>> {
        Ok(self
            .ctx
            .layer
            .tracks_by_relative_path(relative_path)?
            .into_iter()
            .map(|id| Track::new(self.ctx.clone(), id))
            .collect())
    }

    /// Create a track from a snapshot, assigning it a fresh id and
    /// writing every derived field and analysis BLOB atomically.
    pub fn create_track(&self, snapshot: &TrackSnapshot) -> Result<Track> {
        let id = self.ctx.layer.create_track(snapshot)?;
        Ok(Track::new(self.ctx.clone(), id))
    }

    /// Remove a crate and its sub-crates, consuming the handle.
    pub fn remove_crate(&self, cr: Crate) -> Result<()> {
        self.ctx.layer.remove_crate(cr.id())
    }

    /// Remove a track, cascading to crate membership and performance
    /// rows, consuming the handle.
    pub fn remove_track(&self, track: Track) -> Result<()> {
        self.ctx.layer.remove_track(track.id())
    }
}
