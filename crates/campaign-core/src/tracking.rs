//! Open-tracking statistics
//!
//! Aggregates per-recipient open records into overall, per-campaign and
//! per-country summaries, recent activity and the most engaged recipients,
//! and exports the raw records as CSV.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;

/// Days counted as "recent" activity
pub const RECENT_WINDOW_DAYS: i64 = 7;
const RECENT_SHOWN: usize = 5;
const TOP_ENGAGED: usize = 10;

/// One row of the analytics database. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub email: String,
    pub campaign: String,
    pub open_count: u64,
    pub first_opened: Option<DateTime<Utc>>,
    pub last_opened: Option<DateTime<Utc>>,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_opens: u64,
    pub unique_recipients: usize,
    pub average_opens: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign: String,
    pub recipients: usize,
    pub opens: u64,
    pub average_opens: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryStats {
    pub country: String,
    pub records: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentOpen {
    pub email: String,
    pub campaign: String,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub window_days: i64,
    pub recipients: usize,
    pub latest: Vec<RecentOpen>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagedRecipient {
    pub email: String,
    pub campaign: String,
    pub open_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingReport {
    pub generated_at: DateTime<Utc>,
    pub records: usize,
    pub overall: OverallStats,
    pub campaigns: Vec<CampaignStats>,
    pub countries: Vec<CountryStats>,
    pub recent: RecentActivity,
    pub top_engaged: Vec<EngagedRecipient>,
}

impl TrackingReport {
    /// Aggregate `records` as of `now`. Records without an address are ignored.
    pub fn build(records: &[TrackingRecord], now: DateTime<Utc>) -> Self {
        let records: Vec<&TrackingRecord> =
            records.iter().filter(|r| !r.email.trim().is_empty()).collect();

        let total_opens: u64 = records.iter().map(|r| r.open_count).sum();
        let unique_recipients = records
            .iter()
            .map(|r| r.email.as_str())
            .collect::<HashSet<_>>()
            .len();

        let overall = OverallStats {
            total_opens,
            unique_recipients,
            average_opens: ratio(total_opens, unique_recipients),
        };

        let mut by_campaign: BTreeMap<&str, (HashSet<&str>, u64)> = BTreeMap::new();
        for record in &records {
            let name = if record.campaign.is_empty() {
                "Unknown"
            } else {
                record.campaign.as_str()
            };
            let entry = by_campaign.entry(name).or_default();
            entry.0.insert(record.email.as_str());
            entry.1 += record.open_count;
        }
        let campaigns = by_campaign
            .into_iter()
            .map(|(campaign, (recipients, opens))| CampaignStats {
                campaign: campaign.to_string(),
                recipients: recipients.len(),
                opens,
                average_opens: ratio(opens, recipients.len()),
            })
            .collect();

        let mut by_country: HashMap<&str, usize> = HashMap::new();
        for record in &records {
            *by_country.entry(record.country.as_str()).or_default() += 1;
        }
        let mut countries: Vec<CountryStats> = by_country
            .into_iter()
            .map(|(country, count)| CountryStats {
                country: country.to_string(),
                records: count,
                percentage: count as f64 / records.len() as f64 * 100.0,
            })
            .collect();
        countries.sort_by(|a, b| b.records.cmp(&a.records).then(a.country.cmp(&b.country)));

        let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
        let mut recent: Vec<RecentOpen> = records
            .iter()
            .filter_map(|r| {
                r.last_opened
                    .filter(|opened| *opened > cutoff)
                    .map(|opened_at| RecentOpen {
                        email: r.email.clone(),
                        campaign: r.campaign.clone(),
                        opened_at,
                    })
            })
            .collect();
        recent.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        let recent_recipients = recent.len();
        recent.truncate(RECENT_SHOWN);

        let mut engaged: Vec<&&TrackingRecord> = records.iter().collect();
        engaged.sort_by(|a, b| b.open_count.cmp(&a.open_count));
        let top_engaged = engaged
            .into_iter()
            .take(TOP_ENGAGED)
            .map(|r| EngagedRecipient {
                email: r.email.clone(),
                campaign: r.campaign.clone(),
                open_count: r.open_count,
            })
            .collect();

        Self {
            generated_at: now,
            records: records.len(),
            overall,
            campaigns,
            countries,
            recent: RecentActivity {
                window_days: RECENT_WINDOW_DAYS,
                recipients: recent_recipients,
                latest: recent,
            },
            top_engaged,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

fn ratio(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Default export file name, e.g. `email_tracking_export_20250630_142501.csv`
pub fn export_file_name<Tz: chrono::TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("email_tracking_export_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// CSV header; must follow the field order of `TrackingRecord`
pub const EXPORT_COLUMNS: [&str; 6] = [
    "email",
    "campaign",
    "open_count",
    "first_opened",
    "last_opened",
    "country",
];

/// Write records as CSV with a header row, even when there are none
pub fn export_csv<W: io::Write>(records: &[TrackingRecord], writer: W) -> Result<(), csv::Error> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(EXPORT_COLUMNS)?;
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn record(email: &str, campaign: &str, opens: u64, last: Option<DateTime<Utc>>, country: &str) -> TrackingRecord {
        TrackingRecord {
            email: email.to_string(),
            campaign: campaign.to_string(),
            open_count: opens,
            first_opened: last,
            last_opened: last,
            country: country.to_string(),
        }
    }

    fn sample() -> Vec<TrackingRecord> {
        vec![
            record("a@x.org", "launch", 3, Some(at(28, 9)), "United Kingdom"),
            record("b@x.org", "launch", 1, Some(at(10, 9)), "United Kingdom"),
            record("a@x.org", "reminder", 2, Some(at(29, 18)), "United Kingdom"),
            record("c@x.org", "", 4, None, "France"),
        ]
    }

    #[test]
    fn test_overall_stats() {
        let report = TrackingReport::build(&sample(), at(30, 12));
        assert_eq!(report.records, 4);
        assert_eq!(report.overall.total_opens, 10);
        assert_eq!(report.overall.unique_recipients, 3);
        assert!((report.overall.average_opens - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_campaign_stats_sorted_by_name() {
        let report = TrackingReport::build(&sample(), at(30, 12));
        let names: Vec<_> = report.campaigns.iter().map(|c| c.campaign.as_str()).collect();
        assert_eq!(names, vec!["Unknown", "launch", "reminder"]);

        let launch = &report.campaigns[1];
        assert_eq!(launch.recipients, 2);
        assert_eq!(launch.opens, 4);
        assert_eq!(launch.average_opens, 2.0);
    }

    #[test]
    fn test_country_distribution_descending() {
        let report = TrackingReport::build(&sample(), at(30, 12));
        assert_eq!(report.countries[0].country, "United Kingdom");
        assert_eq!(report.countries[0].records, 3);
        assert_eq!(report.countries[0].percentage, 75.0);
        assert_eq!(report.countries[1].country, "France");
    }

    #[test]
    fn test_recent_activity_window() {
        let report = TrackingReport::build(&sample(), at(30, 12));
        assert_eq!(report.recent.recipients, 2);
        assert_eq!(report.recent.latest[0].campaign, "reminder");
        assert_eq!(report.recent.latest[1].campaign, "launch");
    }

    #[test]
    fn test_top_engaged_order() {
        let report = TrackingReport::build(&sample(), at(30, 12));
        let top: Vec<_> = report
            .top_engaged
            .iter()
            .map(|r| (r.email.as_str(), r.open_count))
            .collect();
        assert_eq!(
            top,
            vec![("c@x.org", 4), ("a@x.org", 3), ("a@x.org", 2), ("b@x.org", 1)]
        );
    }

    #[test]
    fn test_empty_report() {
        let report = TrackingReport::build(&[], at(30, 12));
        assert!(report.is_empty());
        assert_eq!(report.overall.average_opens, 0.0);
        assert!(report.countries.is_empty());
    }

    #[test]
    fn test_records_without_email_are_ignored() {
        let mut records = sample();
        records.push(record("", "launch", 9, None, "Spain"));
        let report = TrackingReport::build(&records, at(30, 12));
        assert_eq!(report.records, 4);
    }

    #[test]
    fn test_export_csv_columns() {
        let mut out = Vec::new();
        export_csv(&sample()[..2], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "email,campaign,open_count,first_opened,last_opened,country"
        );
        assert!(lines.next().unwrap().starts_with("a@x.org,launch,3,2025-06-28T09:00:00"));
    }

    #[test]
    fn test_export_csv_empty_dates() {
        let mut out = Vec::new();
        export_csv(&sample()[3..], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("c@x.org,,4,,,France"));
    }

    #[test]
    fn test_export_csv_without_records_has_header() {
        let mut out = Vec::new();
        export_csv(&[], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "email,campaign,open_count,first_opened,last_opened,country\n"
        );
    }

    #[test]
    fn test_export_file_name() {
        let name = export_file_name(Utc.with_ymd_and_hms(2025, 6, 30, 14, 25, 1).unwrap());
        assert_eq!(name, "email_tracking_export_20250630_142501.csv");
    }
}
