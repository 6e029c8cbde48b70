//! Reshape per-user score histories into one dataset on a shared time axis.

use std::collections::{BTreeSet, HashMap};

use api_types::{ScoreEntry, UserProfile};
use futures::future::join_all;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::warn;

use crate::{api::ApiClient, error::ApiError, output};

/// Series colors, assigned round-robin by series index.
pub const PALETTE: [&str; 8] = [
    "#8884d8", "#82ca9d", "#ffc658", "#ff7300", "#0088fe", "#00c49f", "#ff8042", "#a4de6c",
];

/// Y-axis range used when there is nothing to plot.
pub const DEFAULT_RANGE: (f64, f64) = (-10.0, 10.0);

pub fn series_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub user_id: String,
    pub label: String,
    pub color: &'static str,
}

/// Scores of every series at one instant. `None` where a series has no
/// reading at exactly that timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub timestamp: OffsetDateTime,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedSeries {
    pub series: Vec<Series>,
    pub rows: Vec<AlignedRow>,
}

/// Align the histories of `users`, one series per user in the given order.
/// Users without an entry in `histories` get an all-empty series.
pub fn align(users: &[&UserProfile], histories: &HashMap<String, Vec<ScoreEntry>>) -> AlignedSeries {
    let series = users
        .iter()
        .enumerate()
        .map(|(i, u)| Series {
            user_id: u.id.clone(),
            label: u.display_tag(),
            color: series_color(i),
        })
        .collect::<Vec<_>>();

    let timestamps: BTreeSet<OffsetDateTime> = users
        .iter()
        .filter_map(|u| histories.get(&u.id))
        .flatten()
        .map(|e| e.timestamp)
        .collect();

    // later entries at the same instant replace earlier ones
    let lookup: Vec<HashMap<OffsetDateTime, f64>> = users
        .iter()
        .map(|u| {
            histories
                .get(&u.id)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|e| (e.timestamp, e.score_value))
                        .collect::<HashMap<_, _>>()
                })
                .unwrap_or_default()
        })
        .collect();

    let rows = timestamps
        .into_iter()
        .map(|timestamp| AlignedRow {
            timestamp,
            values: lookup.iter().map(|m| m.get(&timestamp).copied()).collect(),
        })
        .collect();

    AlignedSeries { series, rows }
}

impl AlignedSeries {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Smallest and largest score present, or `DEFAULT_RANGE` without data.
    pub fn value_range(&self) -> (f64, f64) {
        self.rows
            .iter()
            .flat_map(|r| r.values.iter().flatten().copied())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .unwrap_or(DEFAULT_RANGE)
    }

    /// CSV with a `timestamp` column and one column per series.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("timestamp");
        for s in &self.series {
            out.push(',');
            out.push_str(&csv_field(&s.label));
        }
        out.push('\n');
        for row in &self.rows {
            out.push_str(&format_timestamp(row.timestamp));
            for v in &row.values {
                out.push(',');
                if let Some(v) = v {
                    out.push_str(&v.to_string());
                }
            }
            out.push('\n');
        }
        out
    }

    /// Terminal table, one column per series. Gaps stay empty.
    pub fn to_table(&self) -> String {
        let mut table = output::table(
            std::iter::once("timestamp".to_string())
                .chain(self.series.iter().map(|s| s.label.clone())),
        );
        for row in &self.rows {
            table.add_row(
                std::iter::once(format_timestamp(row.timestamp))
                    .chain(
                        row.values
                            .iter()
                            .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
                    )
                    .collect::<Vec<_>>(),
            );
        }
        table.to_string()
    }
}

fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

fn csv_field(s: &str) -> String {
    if s.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Fetch the histories `acting_user_id` has given each user concurrently.
/// Failed fetches are returned next to the successful ones.
pub async fn fetch_histories(
    api: &ApiClient,
    acting_user_id: &str,
    users: &[&UserProfile],
    server_id: Option<&str>,
) -> (HashMap<String, Vec<ScoreEntry>>, Vec<(String, ApiError)>) {
    let results = join_all(users.iter().map(|u| async move {
        let result = api.score_history(acting_user_id, &u.id, server_id).await;
        (u.id.clone(), result)
    }))
    .await;

    let mut histories = HashMap::new();
    let mut failures = Vec::new();
    for (id, result) in results {
        match result {
            Ok(history) => {
                histories.insert(id, history.scores_history);
            }
            Err(err) => {
                warn!(user_id = %id, "history fetch failed: {err}");
                failures.push((id, err));
            }
        }
    }
    (histories, failures)
}
