use std::collections::BTreeMap;

use serde::Serialize;

pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 3;
pub const MAX_LEADERBOARD_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    pub month: u32,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub total_score: i64,
}

/// Last month reported for `year` as seen from `today = (year, month)`.
///
/// Past years report all twelve months, the current year stops at the current
/// month, future years report nothing.
pub fn last_reported_month(year: i32, today: (i32, u32)) -> u32 {
    let (current_year, current_month) = today;
    match year.cmp(&current_year) {
        std::cmp::Ordering::Less => 12,
        std::cmp::Ordering::Equal => current_month.clamp(1, 12),
        std::cmp::Ordering::Greater => 0,
    }
}

/// Zero-fill sparse per-month sums into a January-onward sequence.
pub fn fill_months(year: i32, today: (i32, u32), sums: &[(u32, i64)]) -> Vec<MonthlyTotal> {
    let mut by_month: BTreeMap<u32, i64> = BTreeMap::new();
    for (month, total) in sums {
        *by_month.entry(*month).or_default() += total;
    }
    (1..=last_reported_month(year, today))
        .map(|month| MonthlyTotal {
            month,
            total: by_month.get(&month).copied().unwrap_or(0),
        })
        .collect()
}

pub fn clamp_limit(limit: Option<i64>) -> u32 {
    match limit {
        None => DEFAULT_LEADERBOARD_LIMIT,
        Some(n) => n.clamp(1, MAX_LEADERBOARD_LIMIT as i64) as u32,
    }
}

/// Sum scores per name and keep the `limit` highest. Ties break by name.
pub fn rank_scorers<'a>(
    rows: impl IntoIterator<Item = (&'a str, i64)>,
    limit: u32,
) -> Vec<LeaderboardEntry> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for (name, score) in rows {
        *totals.entry(name).or_default() += score;
    }
    let mut entries: Vec<LeaderboardEntry> = totals
        .into_iter()
        .map(|(name, total_score)| LeaderboardEntry {
            name: name.to_string(),
            total_score,
        })
        .collect();
    entries.sort_by(|a, b| b.total_score.cmp(&a.total_score).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(limit as usize);
    entries
}
