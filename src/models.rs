use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::deserialize_optional_day;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Release {
    pub id: i64,
    pub platform: String,
    pub release_type: String,
    pub is_successful: bool,
    pub version: String,
    pub rollout_date: NaiveDate,
    pub mcm_link: Option<String>,
    pub ci_job_link: Option<String>,
    pub commit_list_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Incident {
    pub id: i64,
    pub release_id: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub description: String,
}

impl Incident {
    /// Hours between start and end, when both are known.
    pub fn duration_hours(&self) -> Option<f64> {
        let (start, end) = (self.start_time?, self.end_time?);
        Some((end - start).num_milliseconds() as f64 / 3_600_000.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRelease {
    pub platform: String,
    pub release_type: String,
    #[serde(default = "default_successful")]
    pub is_successful: bool,
    pub version: String,
    #[serde(default, deserialize_with = "deserialize_optional_day")]
    pub rollout_date: Option<NaiveDate>,
    #[serde(default)]
    pub mcm_link: Option<String>,
    #[serde(default)]
    pub ci_job_link: Option<String>,
    #[serde(default)]
    pub commit_list_link: Option<String>,
}

fn default_successful() -> bool {
    true
}

impl NewRelease {
    // releases posted without a date are rolled out today
    pub fn rollout_date(&self) -> NaiveDate {
        self.rollout_date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleasePatch {
    pub platform: Option<String>,
    pub release_type: Option<String>,
    pub is_successful: Option<bool>,
    pub version: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_day")]
    pub rollout_date: Option<NaiveDate>,
    pub mcm_link: Option<String>,
    pub ci_job_link: Option<String>,
    pub commit_list_link: Option<String>,
}

impl ReleasePatch {
    pub fn apply(self, release: &mut Release) {
        if let Some(platform) = self.platform {
            release.platform = platform;
        }
        if let Some(release_type) = self.release_type {
            release.release_type = release_type;
        }
        if let Some(is_successful) = self.is_successful {
            release.is_successful = is_successful;
        }
        if let Some(version) = self.version {
            release.version = version;
        }
        if let Some(rollout_date) = self.rollout_date {
            release.rollout_date = rollout_date;
        }
        if self.mcm_link.is_some() {
            release.mcm_link = self.mcm_link;
        }
        if self.ci_job_link.is_some() {
            release.ci_job_link = self.ci_job_link;
        }
        if self.commit_list_link.is_some() {
            release.commit_list_link = self.commit_list_link;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
    pub release_id: i64,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricResult {
    pub value: f64,
    pub trend: f64,
    pub history: Vec<HistoryPoint>,
}

impl MetricResult {
    pub fn new(value: f64, trend: f64) -> Self {
        Self { value, trend, history: vec![] }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsReport {
    pub deployment_frequency: MetricResult,
    pub lead_time: MetricResult,
    pub change_failure_rate: MetricResult,
    pub time_to_restore: MetricResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Releases rolled out on one day, counted per platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumePoint {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: BTreeMap<String, usize>,
}
