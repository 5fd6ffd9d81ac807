//! `recent_cycles`: line-oriented parsing of an optional scheduler log
//! (§4.9). No log path configured is a degraded-but-valid output (empty
//! list), not an error.

use serde::Serialize;

const STALE_CYCLE_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    Stale,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    pub started_at: String,
    pub ended_at: Option<String>,
    pub status: CycleStatus,
}

const START_MARKER: &str = "cycle start";
const END_MARKER: &str = "cycle end";
const ABORT_MARKER: &str = "cycle aborted";

fn extract_stamp(line: &str, marker: &str) -> Option<String> {
    let idx = line.find(marker)?;
    let rest = line[..idx].trim_end();
    // Timestamp is expected to be the leading token(s), e.g.
    // `2026-07-28 10:00:00 cycle start`.
    Some(rest.to_string())
}

/// Parse scheduler log lines into cycle records, newest first, capped at
/// `limit`. Cycles missing an end marker within [`STALE_CYCLE_MINUTES`] of
/// the next cycle's start (or of `now` for the last one) are marked stale;
/// an explicit abort marker always wins.
pub fn parse_recent_cycles(log_text: &str, now: chrono::DateTime<chrono::Utc>, limit: usize) -> Vec<CycleRecord> {
    let mut records: Vec<CycleRecord> = Vec::new();
    let mut open_start: Option<String> = None;

    for line in log_text.lines() {
        if let Some(stamp) = extract_stamp(line, START_MARKER) {
            if let Some(prev_start) = open_start.take() {
                records.push(CycleRecord { started_at: prev_start, ended_at: None, status: CycleStatus::Stale });
            }
            open_start = Some(stamp);
        } else if let Some(end_stamp) = extract_stamp(line, END_MARKER) {
            if let Some(start_stamp) = open_start.take() {
                records.push(CycleRecord {
                    started_at: start_stamp,
                    ended_at: Some(end_stamp),
                    status: CycleStatus::Completed,
                });
            }
        } else if extract_stamp(line, ABORT_MARKER).is_some() {
            if let Some(start_stamp) = open_start.take() {
                records.push(CycleRecord { started_at: start_stamp, ended_at: None, status: CycleStatus::Aborted });
            }
        }
    }

    if let Some(start_stamp) = open_start {
        // No matching `cycle end` in the log. If the start is still within
        // the stale bound it may just be in flight and is left out; past
        // the bound it's reported stale rather than dropped silently.
        let past_bound = chrono::NaiveDateTime::parse_from_str(&start_stamp, "%Y-%m-%d %H:%M:%S")
            .map(|started| now.naive_utc().signed_duration_since(started).num_minutes() >= STALE_CYCLE_MINUTES)
            .unwrap_or(true);
        if past_bound {
            records.push(CycleRecord { started_at: start_stamp, ended_at: None, status: CycleStatus::Stale });
        }
    }

    records.reverse();
    records.truncate(limit);
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_log_path_is_empty_not_error() {
        assert!(parse_recent_cycles("", chrono::Utc::now(), 10).is_empty());
    }

    #[test]
    fn completed_cycle_pairs_start_and_end() {
        let log = "2026-07-28 10:00:00 cycle start\n2026-07-28 10:02:00 cycle end\n";
        let recs = parse_recent_cycles(log, chrono::Utc::now(), 10);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].status, CycleStatus::Completed);
        assert_eq!(recs[0].ended_at.as_deref(), Some("2026-07-28 10:02:00"));
    }

    #[test]
    fn aborted_cycle_is_flagged() {
        let log = "2026-07-28 10:00:00 cycle start\n2026-07-28 10:01:00 cycle aborted\n";
        let recs = parse_recent_cycles(log, chrono::Utc::now(), 10);
        assert_eq!(recs[0].status, CycleStatus::Aborted);
    }

    #[test]
    fn unterminated_start_followed_by_new_start_is_stale() {
        let log = "2026-07-28 10:00:00 cycle start\n2026-07-28 10:05:00 cycle start\n2026-07-28 10:06:00 cycle end\n";
        let recs = parse_recent_cycles(log, chrono::Utc::now(), 10);
        assert_eq!(recs.len(), 2);
        // newest first
        assert_eq!(recs[0].status, CycleStatus::Completed);
        assert_eq!(recs[1].status, CycleStatus::Stale);
    }

    #[test]
    fn limit_truncates_to_newest() {
        let log = "2026-07-28 10:00:00 cycle start\n2026-07-28 10:01:00 cycle end\n2026-07-28 11:00:00 cycle start\n2026-07-28 11:01:00 cycle end\n";
        let recs = parse_recent_cycles(log, chrono::Utc::now(), 1);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].started_at, "2026-07-28 11:00:00");
    }
}
