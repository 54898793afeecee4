use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// One submission row as loaded for aggregation, joined with its focus
/// group name. The loader returns rows ordered by `submitted_at` ascending.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub submitted_at: DateTime<Utc>,
    pub overall_mood: Option<i16>,
    pub positive_aspects: Vec<String>,
    pub negative_aspects: Vec<String>,
    pub hours_worked: Option<f64>,
    pub did_not_work: bool,
    pub focus_group_id: Uuid,
    pub focus_group_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub name: String,
    pub submissions: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySentiment {
    pub name: String,
    pub avg_mood: f64,
    /// Synthetic comparison value (avgMood jittered by 0.8-1.2); there is
    /// no stored history behind it. Kept for chart compatibility only.
    pub prev_avg_mood: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSatisfaction {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_submissions: i64,
    pub average_mood: Option<f64>,
    pub average_hours: Option<f64>,
    pub top_positive_aspects: Vec<(String, i64)>,
    pub top_negative_aspects: Vec<(String, i64)>,
    pub user_submissions_chart_data: Vec<DailyCount>,
    pub sentiment_chart_data: Vec<WeeklySentiment>,
    pub focus_group_satisfaction_chart_data: Vec<GroupSatisfaction>,
}

const TOP_ASPECT_LIMIT: usize = 5;
const SUBMISSION_WINDOW_DAYS: i64 = 30;
const SENTIMENT_WINDOW_DAYS: i64 = 12 * 7;

pub fn aggregate(records: &[SubmissionRecord], now: DateTime<Utc>) -> AnalyticsSummary {
    aggregate_with(records, now, &mut rand::thread_rng())
}

/// Aggregation over a submission snapshot. Pure apart from the jitter rng;
/// empty input yields zero/null defaults.
pub fn aggregate_with(
    records: &[SubmissionRecord],
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> AnalyticsSummary {
    let total_submissions = records.len() as i64;

    let mut mood_sum = 0.0;
    let mut mood_count = 0i64;
    let mut hours_sum = 0.0;
    let mut hours_count = 0i64;
    for record in records.iter().filter(|r| !r.did_not_work) {
        if let Some(mood) = record.overall_mood {
            mood_sum += mood as f64;
            mood_count += 1;
        }
        if let Some(hours) = record.hours_worked {
            hours_sum += hours;
            hours_count += 1;
        }
    }
    let average_mood = (mood_count > 0).then(|| mood_sum / mood_count as f64);
    let average_hours = (hours_count > 0).then(|| hours_sum / hours_count as f64);

    let top_positive_aspects = top_aspects(records.iter().flat_map(|r| &r.positive_aspects));
    let top_negative_aspects = top_aspects(records.iter().flat_map(|r| &r.negative_aspects));

    let user_submissions_chart_data = daily_counts(records, now);
    let sentiment_chart_data = weekly_sentiment(records, now, rng);
    let focus_group_satisfaction_chart_data = group_satisfaction(records);

    AnalyticsSummary {
        total_submissions,
        average_mood,
        average_hours,
        top_positive_aspects,
        top_negative_aspects,
        user_submissions_chart_data,
        sentiment_chart_data,
        focus_group_satisfaction_chart_data,
    }
}

/// Frequency table over aspect labels, top 5 by count descending.
/// Ties keep first-encountered order (stable sort over insertion order).
fn top_aspects<'a>(labels: impl Iterator<Item = &'a String>) -> Vec<(String, i64)> {
    let mut order: Vec<(String, i64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for label in labels {
        match index.get(label) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(label.clone(), order.len());
                order.push((label.clone(), 1));
            }
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.truncate(TOP_ASPECT_LIMIT);
    order
}

/// Submissions per UTC calendar day over the trailing 30 days, ascending.
/// Days with no submissions are omitted.
fn daily_counts(records: &[SubmissionRecord], now: DateTime<Utc>) -> Vec<DailyCount> {
    let cutoff = now - Duration::days(SUBMISSION_WINDOW_DAYS);
    let mut by_day: Vec<(String, i64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records.iter().filter(|r| r.submitted_at >= cutoff) {
        let key = record.submitted_at.date_naive().to_string();
        match index.get(&key) {
            Some(&i) => by_day[i].1 += 1,
            None => {
                index.insert(key.clone(), by_day.len());
                by_day.push((key, 1));
            }
        }
    }
    by_day.sort_by(|a, b| a.0.cmp(&b.0));
    by_day
        .into_iter()
        .map(|(name, submissions)| DailyCount { name, submissions })
        .collect()
}

/// Average mood per Sunday-started week over the trailing 12 weeks,
/// ascending by week-start date. Only worked submissions with a mood
/// contribute. The previous-period value is a jittered placeholder.
fn weekly_sentiment(
    records: &[SubmissionRecord],
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Vec<WeeklySentiment> {
    let cutoff = now - Duration::days(SENTIMENT_WINDOW_DAYS);
    let mut by_week: Vec<(String, f64, i64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records
        .iter()
        .filter(|r| !r.did_not_work && r.submitted_at >= cutoff)
    {
        let Some(mood) = record.overall_mood else {
            continue;
        };
        let date = record.submitted_at.date_naive();
        let week_start =
            date - Duration::days(record.submitted_at.weekday().num_days_from_sunday() as i64);
        let key = week_start.to_string();
        match index.get(&key) {
            Some(&i) => {
                by_week[i].1 += mood as f64;
                by_week[i].2 += 1;
            }
            None => {
                index.insert(key.clone(), by_week.len());
                by_week.push((key, mood as f64, 1));
            }
        }
    }
    by_week.sort_by(|a, b| a.0.cmp(&b.0));
    by_week
        .into_iter()
        .map(|(name, sum, count)| {
            let avg_mood = sum / count as f64;
            WeeklySentiment {
                name,
                avg_mood,
                prev_avg_mood: avg_mood * (0.8 + rng.gen::<f64>() * 0.4),
            }
        })
        .collect()
}

/// Average mood per focus group across the full snapshot, descending by
/// average. A single-group snapshot yields a one-element series.
fn group_satisfaction(records: &[SubmissionRecord]) -> Vec<GroupSatisfaction> {
    let mut groups: Vec<(String, f64, i64)> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for record in records.iter().filter(|r| !r.did_not_work) {
        let Some(mood) = record.overall_mood else {
            continue;
        };
        match index.get(&record.focus_group_id) {
            Some(&i) => {
                groups[i].1 += mood as f64;
                groups[i].2 += 1;
            }
            None => {
                index.insert(record.focus_group_id, groups.len());
                groups.push((record.focus_group_name.clone(), mood as f64, 1));
            }
        }
    }
    let mut out: Vec<GroupSatisfaction> = groups
        .into_iter()
        .map(|(name, sum, count)| GroupSatisfaction {
            name,
            value: sum / count as f64,
        })
        .collect();
    out.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(now: DateTime<Utc>, days_ago: i64) -> DateTime<Utc> {
        now - Duration::days(days_ago)
    }

    fn record(
        submitted_at: DateTime<Utc>,
        mood: Option<i16>,
        did_not_work: bool,
        group: (Uuid, &str),
    ) -> SubmissionRecord {
        SubmissionRecord {
            submitted_at,
            overall_mood: mood,
            positive_aspects: Vec::new(),
            negative_aspects: Vec::new(),
            hours_worked: None,
            did_not_work,
            focus_group_id: group.0,
            focus_group_name: group.1.to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        // a Wednesday; the Sunday of that week is 2026-03-08
        Utc.with_ymd_and_hms(2026, 3, 11, 12, 0, 0).unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn empty_input_yields_defaults() {
        let summary = aggregate_with(&[], now(), &mut rng());
        assert_eq!(summary.total_submissions, 0);
        assert!(summary.average_mood.is_none());
        assert!(summary.average_hours.is_none());
        assert!(summary.top_positive_aspects.is_empty());
        assert!(summary.user_submissions_chart_data.is_empty());
        assert!(summary.sentiment_chart_data.is_empty());
        assert!(summary.focus_group_satisfaction_chart_data.is_empty());
    }

    #[test]
    fn average_mood_skips_did_not_work_rows() {
        let group = (Uuid::new_v4(), "Operations");
        let records = vec![
            record(at(now(), 1), Some(4), false, group),
            record(at(now(), 2), None, true, group),
            record(at(now(), 3), Some(2), false, group),
        ];
        let summary = aggregate_with(&records, now(), &mut rng());
        assert_eq!(summary.total_submissions, 3);
        assert_eq!(summary.average_mood, Some(3.0));
    }

    #[test]
    fn average_mood_null_when_no_moods() {
        let group = (Uuid::new_v4(), "Operations");
        let records = vec![
            record(at(now(), 1), None, true, group),
            record(at(now(), 2), None, false, group),
        ];
        let summary = aggregate_with(&records, now(), &mut rng());
        assert!(summary.average_mood.is_none());
        assert_eq!(summary.total_submissions, 2);
    }

    #[test]
    fn average_hours_over_worked_subset_only() {
        let group = (Uuid::new_v4(), "IT");
        let mut a = record(at(now(), 1), Some(3), false, group);
        a.hours_worked = Some(40.0);
        let mut b = record(at(now(), 2), None, true, group);
        b.hours_worked = None;
        let mut c = record(at(now(), 3), Some(4), false, group);
        c.hours_worked = Some(50.0);
        let summary = aggregate_with(&[a, b, c], now(), &mut rng());
        assert_eq!(summary.average_hours, Some(45.0));
    }

    #[test]
    fn top_aspects_capped_sorted_and_tie_broken_by_first_seen() {
        let group = (Uuid::new_v4(), "Sales");
        let mut records = Vec::new();
        // seven labels; d/e/f/g tie at one occurrence each
        for labels in [
            vec!["a", "b", "c"],
            vec!["a", "b", "c"],
            vec!["a", "b", "d"],
            vec!["a", "e", "f"],
            vec!["g"],
        ] {
            let mut r = record(at(now(), 1), Some(3), false, group);
            r.positive_aspects = labels.iter().map(|s| s.to_string()).collect();
            records.push(r);
        }
        let summary = aggregate_with(&records, now(), &mut rng());
        let top = &summary.top_positive_aspects;
        assert_eq!(top.len(), 5);
        assert_eq!(top[0], ("a".to_string(), 4));
        assert_eq!(top[1], ("b".to_string(), 3));
        assert_eq!(top[2], ("c".to_string(), 2));
        // d/e/f/g all count 1: first-seen order wins, truncated at five
        assert_eq!(top[3], ("d".to_string(), 1));
        assert_eq!(top[4], ("e".to_string(), 1));
        for pair in top.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn aspects_counted_across_did_not_work_rows_too() {
        // aspect frequency uses ALL rows even though the invariant keeps
        // did-not-work aspect lists empty in practice
        let group = (Uuid::new_v4(), "Sales");
        let mut a = record(at(now(), 1), Some(3), false, group);
        a.negative_aspects = vec!["Workload".to_string()];
        let mut b = record(at(now(), 2), None, true, group);
        b.negative_aspects = vec!["Workload".to_string()];
        let summary = aggregate_with(&[a, b], now(), &mut rng());
        assert_eq!(
            summary.top_negative_aspects,
            vec![("Workload".to_string(), 2)]
        );
    }

    #[test]
    fn daily_counts_window_and_order() {
        let group = (Uuid::new_v4(), "IT");
        let records = vec![
            record(at(now(), 31), Some(3), false, group), // outside window
            record(at(now(), 2), Some(3), false, group),
            record(at(now(), 2), Some(4), false, group),
            record(at(now(), 1), Some(5), false, group),
        ];
        let summary = aggregate_with(&records, now(), &mut rng());
        let chart = &summary.user_submissions_chart_data;
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].name, "2026-03-09");
        assert_eq!(chart[0].submissions, 2);
        assert_eq!(chart[1].name, "2026-03-10");
        assert_eq!(chart[1].submissions, 1);
    }

    #[test]
    fn sentiment_buckets_start_on_sunday() {
        let group = (Uuid::new_v4(), "Business");
        let records = vec![
            // Wed 2026-03-11 and Mon 2026-03-09 share the 2026-03-08 bucket
            record(now(), Some(5), false, group),
            record(at(now(), 2), Some(3), false, group),
            // previous week (Sunday 2026-03-01)
            record(at(now(), 7), Some(2), false, group),
            // outside the 12-week window
            record(at(now(), 85), Some(1), false, group),
            // mood-less and did-not-work rows never contribute
            record(at(now(), 1), None, false, group),
            record(at(now(), 1), Some(5), true, group),
        ];
        let summary = aggregate_with(&records, now(), &mut rng());
        let chart = &summary.sentiment_chart_data;
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].name, "2026-03-01");
        assert_eq!(chart[0].avg_mood, 2.0);
        assert_eq!(chart[1].name, "2026-03-08");
        assert_eq!(chart[1].avg_mood, 4.0);
        for bucket in chart {
            assert!(bucket.prev_avg_mood >= bucket.avg_mood * 0.8);
            assert!(bucket.prev_avg_mood <= bucket.avg_mood * 1.2);
        }
    }

    #[test]
    fn group_satisfaction_sorted_descending() {
        let ops = (Uuid::new_v4(), "Operations");
        let sales = (Uuid::new_v4(), "Sales");
        let records = vec![
            record(at(now(), 1), Some(2), false, ops),
            record(at(now(), 2), Some(4), false, sales),
            record(at(now(), 3), Some(5), false, sales),
        ];
        let summary = aggregate_with(&records, now(), &mut rng());
        let chart = &summary.focus_group_satisfaction_chart_data;
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].name, "Sales");
        assert_eq!(chart[0].value, 4.5);
        assert_eq!(chart[1].name, "Operations");
        assert_eq!(chart[1].value, 2.0);
    }

    #[test]
    fn single_group_yields_one_element_series() {
        let group = (Uuid::new_v4(), "IT");
        let records = vec![record(at(now(), 1), Some(4), false, group)];
        let summary = aggregate_with(&records, now(), &mut rng());
        assert_eq!(summary.focus_group_satisfaction_chart_data.len(), 1);
    }
}
