use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::ReleaseStore;
use crate::{
    error::StoreError,
    models::{Incident, NewIncident, NewRelease, Release, ReleasePatch},
};

#[derive(Default)]
struct Tables {
    releases: BTreeMap<i64, Release>,
    incidents: BTreeMap<i64, Incident>,
    last_release_id: i64,
    last_incident_id: i64,
}

/// Process-local store; ids are handed out sequentially from 1.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReleaseStore for MemoryStore {
    async fn find_releases(
        &self,
        platform: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Release>, StoreError> {
        let tables = self.tables.read().await;
        let mut releases: Vec<Release> = tables
            .releases
            .values()
            .filter(|r| platform.map_or(true, |p| r.platform == p))
            .filter(|r| start.map_or(true, |s| r.rollout_date >= s))
            .filter(|r| end.map_or(true, |e| r.rollout_date <= e))
            .cloned()
            .collect();
        // values are already in id order, so a stable sort keeps ids ascending per day
        releases.sort_by_key(|r| r.rollout_date);
        Ok(releases)
    }

    async fn find_incidents(&self, release_ids: &[i64]) -> Result<Vec<Incident>, StoreError> {
        let ids: HashSet<i64> = release_ids.iter().copied().collect();
        let tables = self.tables.read().await;
        Ok(tables
            .incidents
            .values()
            .filter(|i| ids.contains(&i.release_id))
            .cloned()
            .collect())
    }

    async fn get_release(&self, id: i64) -> Result<Option<Release>, StoreError> {
        Ok(self.tables.read().await.releases.get(&id).cloned())
    }

    async fn create_release(&self, release: NewRelease) -> Result<Release, StoreError> {
        let mut tables = self.tables.write().await;
        tables.last_release_id += 1;
        let created = Release {
            id: tables.last_release_id,
            rollout_date: release.rollout_date(),
            platform: release.platform,
            release_type: release.release_type,
            is_successful: release.is_successful,
            version: release.version,
            mcm_link: release.mcm_link,
            ci_job_link: release.ci_job_link,
            commit_list_link: release.commit_list_link,
        };
        tables.releases.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_release(&self, id: i64, patch: ReleasePatch) -> Result<Release, StoreError> {
        let mut tables = self.tables.write().await;
        let release = tables
            .releases
            .get_mut(&id)
            .ok_or_else(|| StoreError::release_not_found(id))?;
        patch.apply(release);
        Ok(release.clone())
    }

    async fn delete_release(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .releases
            .remove(&id)
            .ok_or_else(|| StoreError::release_not_found(id))?;
        tables.incidents.retain(|_, i| i.release_id != id);
        Ok(())
    }

    async fn create_incident(&self, incident: NewIncident) -> Result<Incident, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.releases.contains_key(&incident.release_id) {
            return Err(StoreError::release_not_found(incident.release_id));
        }

        tables.last_incident_id += 1;
        let created = Incident {
            id: tables.last_incident_id,
            release_id: incident.release_id,
            start_time: incident.start_time,
            end_time: incident.end_time,
            description: incident.description,
        };
        tables.incidents.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_incident(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .incidents
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::incident_not_found(id))
    }
}
