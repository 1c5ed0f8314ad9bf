//! DORA metrics over release and incident collections.
//!
//! Every function here is pure: callers hand in whatever the store returned
//! and get numbers back. Degenerate inputs (empty lists, single releases,
//! incidents without timestamps) produce zeros instead of errors.

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate};

use crate::{
    dates::DateWindow,
    models::{Incident, MetricResult, MetricsReport, Release, VolumePoint},
};

/// No commit timestamps are modelled, so lead time is a fixed estimate.
pub const LEAD_TIME_PLACEHOLDER_HOURS: f64 = 24.0;

pub const NO_RELEASES_NOTE: &str = "No releases found for the given criteria";

/// Deployments per day between the earliest and latest release in `[start, end]`.
///
/// Needs at least two releases inside the window. A span of zero days counts
/// as one day.
pub fn deployment_frequency(
    releases: &[Release],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> f64 {
    if releases.len() < 2 {
        return 0.0;
    }

    let window = DateWindow { start, end };
    let dates: Vec<NaiveDate> = releases
        .iter()
        .map(|r| r.rollout_date)
        .filter(|date| window.contains(*date))
        .collect();

    let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
        return 0.0;
    };
    if dates.len() < 2 {
        return 0.0;
    }

    let days = (*last - *first).num_days().max(1);
    dates.len() as f64 / days as f64
}

/// Mean hours from commit to deploy.
pub fn lead_time(releases: &[Release]) -> f64 {
    if releases.iter().any(|r| r.is_successful) {
        LEAD_TIME_PLACEHOLDER_HOURS
    } else {
        0.0
    }
}

/// Percentage of releases marked unsuccessful.
pub fn change_failure_rate(releases: &[Release]) -> f64 {
    if releases.is_empty() {
        return 0.0;
    }

    let failed = releases.iter().filter(|r| !r.is_successful).count();
    failed as f64 / releases.len() as f64 * 100.0
}

/// Mean incident duration in hours, skipping incidents without both timestamps.
pub fn time_to_restore(incidents: &[Incident]) -> f64 {
    let durations: Vec<f64> = incidents.iter().filter_map(Incident::duration_hours).collect();
    if durations.is_empty() {
        return 0.0;
    }

    durations.iter().sum::<f64>() / durations.len() as f64
}

/// Percentage change from `previous` to `current`.
///
/// A zero baseline yields 0 when nothing changed and 100 otherwise.
pub fn trend(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current == 0.0 { 0.0 } else { 100.0 };
    }
    (current - previous) / previous * 100.0
}

/// Range the store should be asked for so the previous period is covered too.
///
/// The start is pulled back by `lookback_days`, or further when the previous
/// period of a long window starts earlier than that.
pub fn fetch_range(window: &DateWindow, lookback_days: u32) -> DateWindow {
    let start = window.start.map(|start| {
        let widened = start
            .checked_sub_signed(Duration::days(i64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        match window.previous().and_then(|prev| prev.start) {
            Some(prev_start) => prev_start.min(widened),
            None => widened,
        }
    });

    DateWindow { start, end: window.end }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Snapshot {
    deployment_frequency: f64,
    lead_time: f64,
    change_failure_rate: f64,
    time_to_restore: f64,
}

impl Snapshot {
    fn measure(releases: &[Release], incidents: &[Incident], window: &DateWindow) -> Self {
        Self {
            deployment_frequency: deployment_frequency(releases, window.start, window.end),
            lead_time: lead_time(releases),
            change_failure_rate: change_failure_rate(releases),
            time_to_restore: time_to_restore(incidents),
        }
    }
}

struct Period {
    releases: Vec<Release>,
    incidents: Vec<Incident>,
}

impl Period {
    fn select(releases: &[Release], incidents: &[Incident], window: &DateWindow) -> Self {
        let releases: Vec<Release> = releases
            .iter()
            .filter(|r| window.contains(r.rollout_date))
            .cloned()
            .collect();
        let ids: HashSet<i64> = releases.iter().map(|r| r.id).collect();
        let incidents = incidents
            .iter()
            .filter(|i| ids.contains(&i.release_id) && incident_within(i, window))
            .cloned()
            .collect();

        Self { releases, incidents }
    }
}

fn incident_within(incident: &Incident, window: &DateWindow) -> bool {
    let started = match (window.start, incident.start_time) {
        (Some(start), Some(at)) => at.date_naive() >= start,
        _ => true,
    };
    let ended = match (window.end, incident.end_time) {
        (Some(end), Some(at)) => at.date_naive() <= end,
        _ => true,
    };
    started && ended
}

impl MetricsReport {
    pub fn empty() -> Self {
        Self {
            note: Some(NO_RELEASES_NOTE.to_string()),
            ..Self::default()
        }
    }
}

/// Build the full report for `window` out of a possibly widened record set.
///
/// Only an empty record set short-circuits to [`MetricsReport::empty`]; a
/// window without releases of its own still reports zeros and trends. Trends compare against the previous period of the same length and stay at
/// zero when the window is open-ended or the previous period has no releases.
pub fn compute_report(releases: &[Release], incidents: &[Incident], window: &DateWindow) -> MetricsReport {
    if releases.is_empty() {
        return MetricsReport::empty();
    }
    let current = Period::select(releases, incidents, window);
    let now = Snapshot::measure(&current.releases, &current.incidents, window);

    let before = window.previous().and_then(|prev_window| {
        let prev = Period::select(releases, incidents, &prev_window);
        if prev.releases.is_empty() {
            None
        } else {
            Some(Snapshot::measure(&prev.releases, &prev.incidents, &prev_window))
        }
    });

    tracing::debug!(
        releases = current.releases.len(),
        incidents = current.incidents.len(),
        has_previous = before.is_some(),
        "computed metrics"
    );

    let trend_of = |pick: fn(&Snapshot) -> f64| before.as_ref().map_or(0.0, |b| trend(pick(&now), pick(b)));

    MetricsReport {
        deployment_frequency: MetricResult::new(
            now.deployment_frequency,
            trend_of(|s| s.deployment_frequency),
        ),
        lead_time: MetricResult::new(now.lead_time, trend_of(|s| s.lead_time)),
        change_failure_rate: MetricResult::new(
            now.change_failure_rate,
            trend_of(|s| s.change_failure_rate),
        ),
        time_to_restore: MetricResult::new(now.time_to_restore, trend_of(|s| s.time_to_restore)),
        note: None,
    }
}

/// Releases per day and platform inside `window`, oldest day first.
pub fn deployment_volume(releases: &[Release], window: &DateWindow) -> Vec<VolumePoint> {
    let mut days: BTreeMap<NaiveDate, BTreeMap<String, usize>> = BTreeMap::new();
    for release in releases.iter().filter(|r| window.contains(r.rollout_date)) {
        *days
            .entry(release.rollout_date)
            .or_default()
            .entry(release.platform.clone())
            .or_insert(0) += 1;
    }

    days.into_iter()
        .map(|(date, counts)| VolumePoint { date, counts })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap() + Duration::days(offset)
    }

    fn release(id: i64, offset: i64, ok: bool) -> Release {
        Release {
            id,
            platform: String::from("Android"),
            release_type: String::from("release"),
            is_successful: ok,
            version: format!("1.0.{id}"),
            rollout_date: day(offset),
            mcm_link: None,
            ci_job_link: None,
            commit_list_link: None,
        }
    }

    fn incident(id: i64, release_id: i64, offset: i64, from_h: u32, to_h: Option<u32>) -> Incident {
        let at = |h: u32| Utc.from_utc_datetime(&day(offset).and_hms_opt(h, 0, 0).unwrap());
        Incident {
            id,
            release_id,
            start_time: Some(at(from_h)),
            end_time: to_h.map(at),
            description: String::new(),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-2
    }

    /// A week of daily releases ending on day 0; the two oldest failed.
    fn week() -> (Vec<Release>, Vec<Incident>) {
        let releases: Vec<Release> = (0..7).rev().map(|i| release(i + 1, -i, i < 5)).collect();
        let incidents = vec![incident(1, 6, -5, 1, Some(3)), incident(2, 7, -6, 1, Some(3))];
        (releases, incidents)
    }

    #[test]
    fn frequency_needs_two_releases() {
        assert_eq!(deployment_frequency(&[], None, None), 0.0);
        assert_eq!(deployment_frequency(&[release(1, 0, true)], None, None), 0.0);

        // two releases, only one inside the window
        let rs = [release(1, -5, true), release(2, 0, true)];
        assert_eq!(deployment_frequency(&rs, Some(day(-1)), None), 0.0);
    }

    #[test]
    fn same_day_releases_use_one_day_floor() {
        let rs = [release(1, 0, true), release(2, 0, true), release(3, 0, false)];
        assert!(close(deployment_frequency(&rs, None, None), 3.0));
    }

    #[test]
    fn frequency_divides_by_span_in_days() {
        let (releases, _) = week();
        assert!(close(deployment_frequency(&releases, None, None), 7.0 / 6.0));
        assert!(close(
            deployment_frequency(&releases, Some(day(-3)), Some(day(0))),
            4.0 / 3.0
        ));
    }

    #[test]
    fn lead_time_is_placeholder_for_any_success() {
        assert_eq!(lead_time(&[]), 0.0);
        assert_eq!(lead_time(&[release(1, 0, false)]), 0.0);
        assert_eq!(
            lead_time(&[release(1, 0, false), release(2, 1, true)]),
            LEAD_TIME_PLACEHOLDER_HOURS
        );
    }

    #[test]
    fn failure_rate_bounds() {
        assert_eq!(change_failure_rate(&[]), 0.0);
        let good: Vec<Release> = (0..4).map(|i| release(i, i, true)).collect();
        let bad: Vec<Release> = (0..4).map(|i| release(i, i, false)).collect();
        assert_eq!(change_failure_rate(&good), 0.0);
        assert_eq!(change_failure_rate(&bad), 100.0);

        let (releases, _) = week();
        assert!(close(change_failure_rate(&releases), 28.57));
    }

    #[test]
    fn restore_time_skips_open_incidents() {
        let incidents = [
            incident(1, 1, 0, 1, Some(3)),
            incident(2, 1, 0, 2, None),
            incident(3, 1, 0, 0, Some(4)),
        ];
        assert!(close(time_to_restore(&incidents), 3.0));
        assert_eq!(time_to_restore(&incidents[1..2]), 0.0);
        assert_eq!(time_to_restore(&[]), 0.0);
    }

    #[test]
    fn trend_special_cases() {
        assert_eq!(trend(0.0, 0.0), 0.0);
        assert_eq!(trend(3.5, 0.0), 100.0);
        assert_eq!(trend(7.0, 7.0), 0.0);
        assert!(close(trend(15.0, 10.0), 50.0));
        assert!(close(trend(5.0, 10.0), -50.0));
    }

    #[test]
    fn fetch_range_widens_start_only() {
        let window = DateWindow::new(Some(day(-3)), Some(day(0))).unwrap();
        let range = fetch_range(&window, 30);
        assert_eq!(range.start, Some(day(-33)));
        assert_eq!(range.end, Some(day(0)));

        // previous period of a 90 day window reaches past the lookback
        let long = DateWindow::new(Some(day(-90)), Some(day(0))).unwrap();
        assert_eq!(fetch_range(&long, 30).start, Some(day(-181)));

        assert_eq!(fetch_range(&DateWindow::unbounded(), 30), DateWindow::unbounded());
    }

    #[test]
    fn unbounded_report_has_no_trends() {
        let (releases, incidents) = week();
        let report = compute_report(&releases, &incidents, &DateWindow::unbounded());

        assert!(report.note.is_none());
        assert!(close(report.deployment_frequency.value, 1.1666));
        assert!(close(report.change_failure_rate.value, 28.57));
        assert!(close(report.time_to_restore.value, 2.0));
        assert_eq!(report.lead_time.value, 24.0);
        assert_eq!(report.change_failure_rate.trend, 0.0);
        assert!(report.time_to_restore.history.is_empty());
    }

    #[test]
    fn bounded_report_compares_against_previous_period() {
        let (releases, incidents) = week();
        let window = DateWindow::new(Some(day(-3)), Some(day(0))).unwrap();
        let report = compute_report(&releases, &incidents, &window);

        // current: days -3..=0, all successful; previous: days -7..=-4
        assert!(close(report.deployment_frequency.value, 4.0 / 3.0));
        assert_eq!(report.change_failure_rate.value, 0.0);
        assert_eq!(report.time_to_restore.value, 0.0);

        assert!(close(report.deployment_frequency.trend, -11.11));
        assert!(close(report.change_failure_rate.trend, -100.0));
        assert!(close(report.time_to_restore.trend, -100.0));
        assert_eq!(report.lead_time.trend, 0.0);
    }

    #[test]
    fn empty_previous_period_leaves_trends_at_zero() {
        let releases = vec![release(1, -1, false), release(2, 0, false)];
        let window = DateWindow::new(Some(day(-1)), Some(day(0))).unwrap();
        let report = compute_report(&releases, &[], &window);

        assert_eq!(report.change_failure_rate.value, 100.0);
        assert_eq!(report.change_failure_rate.trend, 0.0);
        assert_eq!(report.deployment_frequency.trend, 0.0);
    }

    #[test]
    fn incidents_outside_window_are_dropped() {
        let releases = vec![release(1, 0, false), release(2, 1, false)];
        // the second incident on release 1 is only logged the next day
        let incidents = vec![incident(1, 1, 0, 1, Some(2)), incident(2, 1, 1, 1, Some(5))];
        let window = DateWindow::new(Some(day(0)), Some(day(0))).unwrap();
        let report = compute_report(&releases, &incidents, &window);

        assert!(close(report.time_to_restore.value, 1.0));
    }

    #[test]
    fn empty_input_yields_note() {
        let report = compute_report(&[], &[], &DateWindow::unbounded());
        assert_eq!(report, MetricsReport::empty());
        assert_eq!(report.note.as_deref(), Some(NO_RELEASES_NOTE));

        let window = DateWindow::new(Some(day(30)), Some(day(40))).unwrap();
        assert_eq!(compute_report(&[], &[], &window), MetricsReport::empty());
    }

    #[test]
    fn window_without_own_releases_is_still_measured() {
        let (releases, incidents) = week();
        let window = DateWindow::new(Some(day(30)), None).unwrap();
        let report = compute_report(&releases, &incidents, &window);

        assert!(report.note.is_none());
        assert_eq!(report.deployment_frequency.value, 0.0);
        assert_eq!(report.change_failure_rate.value, 0.0);
        assert_eq!(report.change_failure_rate.trend, 0.0);
    }

    #[test]
    fn releases_only_in_previous_period_drive_trends() {
        // window is days 0..=3, previous period days -4..=-1
        let releases = vec![release(1, -4, false), release(2, -2, false)];
        let window = DateWindow::new(Some(day(0)), Some(day(3))).unwrap();
        let report = compute_report(&releases, &[], &window);

        assert!(report.note.is_none());
        assert_eq!(report.change_failure_rate.value, 0.0);
        assert!(close(report.change_failure_rate.trend, -100.0));
        assert_eq!(report.deployment_frequency.value, 0.0);
        assert!(close(report.deployment_frequency.trend, -100.0));
        assert_eq!(report.lead_time.trend, 0.0);
        assert_eq!(report.time_to_restore.trend, 0.0);
    }

    #[test]
    fn volume_groups_by_day_and_platform() {
        let mut releases = vec![release(1, 0, true), release(2, 0, true), release(3, 2, false)];
        releases[1].platform = String::from("Roku");
        releases.push(release(4, 0, true));

        let volume = deployment_volume(&releases, &DateWindow::unbounded());
        assert_eq!(volume.len(), 2);
        assert_eq!(volume[0].date, day(0));
        assert_eq!(volume[0].counts["Android"], 2);
        assert_eq!(volume[0].counts["Roku"], 1);
        assert_eq!(volume[1].counts["Android"], 1);

        let window = DateWindow::new(Some(day(1)), None).unwrap();
        assert_eq!(deployment_volume(&releases, &window).len(), 1);
    }
}
