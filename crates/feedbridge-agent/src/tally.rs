//! Weekly per-host frequency report behind the `stats` command.
//!
//! Week buckets are anchored to the evaluation moment rather than to calendar
//! weeks: a record's week is
//! `ceil((weekday(now) + 1 + days_since_year_start(record)) / 7)` with
//! Sunday = 0 and the year start taken in `now`'s offset.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, FixedOffset, TimeZone};
use regex::Regex;

use feedbridge_core::EventRecord;

/// Hosts listed per week.
pub const TOP_HOSTS: usize = 5;

const MILLIS_PER_DAY: i64 = 86_400_000;

static LEADING_WILDCARDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\*[*\-]*\.)+").expect("leading wildcard pattern is valid")
});
static DOTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{2,}").expect("dot run pattern is valid"));
static DASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("dash run pattern is valid"));

/// Normalise a feed host for display: leading wildcard labels become one
/// `*.` and runs of `.` or `-` are squeezed.
pub fn mask_host(host: &str) -> String {
    let host = LEADING_WILDCARDS.replace(host, "*.");
    let host = DOTS.replace_all(&host, ".");
    DASHES.replace_all(&host, "-").into_owned()
}

/// Week bucket of a record timestamp relative to `now`.
///
/// Returns `None` only if the year start cannot be represented in `now`'s offset.
pub fn week_number(record_millis: i64, now: &DateTime<FixedOffset>) -> Option<i64> {
    let year_start = now
        .offset()
        .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .single()?;
    let days = (record_millis - year_start.timestamp_millis()).div_euclid(MILLIS_PER_DAY);
    let weekday = i64::from(now.weekday().num_days_from_sunday());
    let n = weekday + 1 + days;
    // ceil(n / 7) for possibly negative n
    Some(-(-n).div_euclid(7))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekSummary {
    pub week: i64,
    pub total: usize,
    pub distinct_hosts: usize,
    /// At most [`TOP_HOSTS`] entries, busiest first.
    pub top: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyReport {
    pub this_week: Option<WeekSummary>,
    pub last_week: Option<WeekSummary>,
}

/// Host counts in first-appearance order.
#[derive(Default)]
struct Bucket {
    order: Vec<(String, usize)>,
    index: HashMap<String, usize>,
    total: usize,
}

impl Bucket {
    fn add(&mut self, host: String) {
        self.total += 1;
        match self.index.get(&host) {
            Some(&i) => self.order[i].1 += 1,
            None => {
                self.index.insert(host.clone(), self.order.len());
                self.order.push((host, 1));
            }
        }
    }

    fn summarize(self, week: i64) -> WeekSummary {
        let distinct_hosts = self.order.len();
        let mut ranked = self.order;
        // stable: equal counts keep first-appearance order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(TOP_HOSTS);
        WeekSummary {
            week,
            total: self.total,
            distinct_hosts,
            top: ranked,
        }
    }
}

/// Bucket `records` (snapshot order) by week and rank hosts in the two most
/// recent non-empty weeks. Records whose id carries no timestamp are skipped.
pub fn tally<'a, I>(records: I, now: &DateTime<FixedOffset>) -> TallyReport
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut weeks: BTreeMap<i64, Bucket> = BTreeMap::new();
    for record in records {
        let Some(week) = record
            .id
            .timestamp_millis()
            .and_then(|ms| week_number(ms, now))
        else {
            continue;
        };
        weeks
            .entry(week)
            .or_default()
            .add(mask_host(&record.fields.origin_host));
    }

    let mut recent = weeks.into_iter().rev();
    TallyReport {
        this_week: recent.next().map(|(w, b)| b.summarize(w)),
        last_week: recent.next().map(|(w, b)| b.summarize(w)),
    }
}

impl TallyReport {
    /// Reply text for the feed.
    pub fn render(&self) -> String {
        let Some(ref this) = self.this_week else {
            return "no records to tally yet".to_string();
        };
        let mut out = String::new();
        render_week(&mut out, "this week", this);
        if let Some(ref last) = self.last_week {
            out.push('\n');
            render_week(&mut out, "last week", last);
        }
        out
    }
}

fn render_week(out: &mut String, label: &str, week: &WeekSummary) {
    let _ = write!(
        out,
        "{label}: {} posts from {} hosts",
        week.total, week.distinct_hosts
    );
    for (rank, (host, count)) in week.top.iter().enumerate() {
        let _ = write!(out, "\n {}. {host} ({count})", rank + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use feedbridge_core::{EventFields, EventId};

    fn now() -> DateTime<FixedOffset> {
        // Wednesday
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 13, 12, 0, 0)
            .unwrap()
    }

    fn at(month: u32, day: u32, seq: u64, host: &str) -> EventRecord {
        let ms = Utc
            .with_ymd_and_hms(2024, month, day, 9, 0, 0)
            .unwrap()
            .timestamp_millis();
        EventRecord {
            id: EventId::new(ms, seq),
            raw_text: format!("{month}/{day}/{seq}"),
            fields: EventFields {
                message: "hi".into(),
                date: String::new(),
                time: String::new(),
                origin_host: host.into(),
                is_self: false,
            },
        }
    }

    #[test]
    fn weeks_are_anchored_to_now() {
        let now = now();
        let ms = |m, d| Utc.with_ymd_and_hms(2024, m, d, 9, 0, 0).unwrap().timestamp_millis();
        // weekday 3, Mar 13 is day 72: ceil(76 / 7) = 11
        assert_eq!(week_number(ms(3, 13), &now), Some(11));
        assert_eq!(week_number(ms(3, 8), &now), Some(11));
        assert_eq!(week_number(ms(3, 7), &now), Some(10));
        assert_eq!(week_number(ms(2, 1), &now), Some(5));
        assert_eq!(week_number(ms(1, 1), &now), Some(1));
    }

    #[test]
    fn masks_wildcard_hosts() {
        assert_eq!(mask_host("*.*.example.jp"), "*.example.jp");
        assert_eq!(mask_host("**.example.jp"), "*.example.jp");
        assert_eq!(mask_host("*-*.foo..bar--baz"), "*.foo.bar-baz");
        assert_eq!(mask_host("plain.example.net"), "plain.example.net");
    }

    #[test]
    fn ranks_two_most_recent_weeks() {
        // newest first, as the cache snapshot yields them
        let records = vec![
            at(3, 13, 5, "a.example"),
            at(3, 13, 4, "c.example"),
            at(3, 12, 0, "*.*.b.example"),
            at(3, 11, 0, "a.example"),
            at(3, 10, 0, "b.example"),
            at(3, 9, 0, "c.example"),
            at(3, 9, 1, "d.example"),
            at(3, 9, 2, "e.example"),
            at(3, 8, 0, "f.example"),
            at(3, 8, 1, "a.example"),
            // last week
            at(3, 5, 0, "x.example"),
            at(3, 4, 0, "y.example"),
            at(3, 3, 0, "y.example"),
            // older, not reported
            at(2, 1, 0, "old.example"),
        ];

        let report = tally(&records, &now());

        let this = report.this_week.as_ref().unwrap();
        assert_eq!(this.week, 11);
        assert_eq!(this.total, 10);
        assert_eq!(this.distinct_hosts, 7);
        assert_eq!(
            this.top,
            vec![
                ("a.example".to_string(), 3),
                ("c.example".to_string(), 2),
                ("*.b.example".to_string(), 1),
                ("b.example".to_string(), 1),
                ("d.example".to_string(), 1),
            ]
        );

        let last = report.last_week.as_ref().unwrap();
        assert_eq!(last.week, 10);
        assert_eq!(last.distinct_hosts, 2);
        assert_eq!(
            last.top,
            vec![("y.example".to_string(), 2), ("x.example".to_string(), 1)]
        );

        let text = report.render();
        assert!(text.starts_with("this week: 10 posts from 7 hosts\n 1. a.example (3)"));
        assert!(text.contains("last week: 3 posts from 2 hosts\n 1. y.example (2)"));
    }

    #[test]
    fn empty_cache_renders_placeholder() {
        let report = tally(std::iter::empty(), &now());
        assert_eq!(report, TallyReport::default());
        assert_eq!(report.render(), "no records to tally yet");
    }
}
