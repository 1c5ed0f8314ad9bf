use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::ReleaseStore;
use crate::{
    config::DatabaseConfig,
    error::StoreError,
    models::{Incident, NewIncident, NewRelease, Release, ReleasePatch},
};

const RELEASE_COLUMNS: &str = "id, platform, release_type, is_successful, version, rollout_date, mcm_link, ci_job_link, commit_list_link";
const INCIDENT_COLUMNS: &str = "id, release_id, start_time, end_time, description";

/// Store over the `releases` / `incidents` tables described in `schema.sql`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        tracing::info!(max_connections = config.max_connections, "connected to postgres");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReleaseStore for PgStore {
    async fn find_releases(
        &self,
        platform: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Release>, StoreError> {
        let sql = format!(
            "SELECT {RELEASE_COLUMNS} FROM releases \
             WHERE ($1::text IS NULL OR platform = $1) \
               AND ($2::date IS NULL OR rollout_date >= $2) \
               AND ($3::date IS NULL OR rollout_date <= $3) \
             ORDER BY rollout_date, id"
        );
        let releases = sqlx::query_as::<_, Release>(&sql)
            .bind(platform)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(releases)
    }

    async fn find_incidents(&self, release_ids: &[i64]) -> Result<Vec<Incident>, StoreError> {
        if release_ids.is_empty() {
            return Ok(vec![]);
        }

        let sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE release_id = ANY($1) ORDER BY id");
        let incidents = sqlx::query_as::<_, Incident>(&sql)
            .bind(release_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(incidents)
    }

    async fn get_release(&self, id: i64) -> Result<Option<Release>, StoreError> {
        let sql = format!("SELECT {RELEASE_COLUMNS} FROM releases WHERE id = $1");
        let release = sqlx::query_as::<_, Release>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(release)
    }

    async fn create_release(&self, release: NewRelease) -> Result<Release, StoreError> {
        let sql = format!(
            "INSERT INTO releases (platform, release_type, is_successful, version, rollout_date, mcm_link, ci_job_link, commit_list_link) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {RELEASE_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Release>(&sql)
            .bind(&release.platform)
            .bind(&release.release_type)
            .bind(release.is_successful)
            .bind(&release.version)
            .bind(release.rollout_date())
            .bind(&release.mcm_link)
            .bind(&release.ci_job_link)
            .bind(&release.commit_list_link)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update_release(&self, id: i64, patch: ReleasePatch) -> Result<Release, StoreError> {
        let sql = format!(
            "UPDATE releases SET \
               platform = COALESCE($2, platform), \
               release_type = COALESCE($3, release_type), \
               is_successful = COALESCE($4, is_successful), \
               version = COALESCE($5, version), \
               rollout_date = COALESCE($6, rollout_date), \
               mcm_link = COALESCE($7, mcm_link), \
               ci_job_link = COALESCE($8, ci_job_link), \
               commit_list_link = COALESCE($9, commit_list_link) \
             WHERE id = $1 RETURNING {RELEASE_COLUMNS}"
        );
        sqlx::query_as::<_, Release>(&sql)
            .bind(id)
            .bind(patch.platform)
            .bind(patch.release_type)
            .bind(patch.is_successful)
            .bind(patch.version)
            .bind(patch.rollout_date)
            .bind(patch.mcm_link)
            .bind(patch.ci_job_link)
            .bind(patch.commit_list_link)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::release_not_found(id))
    }

    async fn delete_release(&self, id: i64) -> Result<(), StoreError> {
        // incidents go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM releases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::release_not_found(id));
        }
        Ok(())
    }

    async fn create_incident(&self, incident: NewIncident) -> Result<Incident, StoreError> {
        if self.get_release(incident.release_id).await?.is_none() {
            return Err(StoreError::release_not_found(incident.release_id));
        }

        let sql = format!(
            "INSERT INTO incidents (release_id, start_time, end_time, description) \
             VALUES ($1, $2, $3, $4) RETURNING {INCIDENT_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Incident>(&sql)
            .bind(incident.release_id)
            .bind(incident.start_time)
            .bind(incident.end_time)
            .bind(&incident.description)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn delete_incident(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::incident_not_found(id));
        }
        Ok(())
    }
}
