//! Release and incident persistence behind one repository trait.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::StoreError,
    models::{Incident, NewIncident, NewRelease, Release, ReleasePatch},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Releases on `platform` (any platform when `None`) rolled out within the
    /// inclusive range, ordered by rollout date then id.
    async fn find_releases(
        &self,
        platform: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Release>, StoreError>;

    async fn find_incidents(&self, release_ids: &[i64]) -> Result<Vec<Incident>, StoreError>;

    async fn get_release(&self, id: i64) -> Result<Option<Release>, StoreError>;

    async fn create_release(&self, release: NewRelease) -> Result<Release, StoreError>;

    async fn update_release(&self, id: i64, patch: ReleasePatch) -> Result<Release, StoreError>;

    /// Removes the release together with all of its incidents.
    async fn delete_release(&self, id: i64) -> Result<(), StoreError>;

    async fn create_incident(&self, incident: NewIncident) -> Result<Incident, StoreError>;

    async fn delete_incident(&self, id: i64) -> Result<(), StoreError>;
}
