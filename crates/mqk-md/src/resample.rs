//! Resample a finer-grained bar series up to a coarser interval using
//! first/max/min/last/sum aggregation (§4.1): open=first, high=max, low=min,
//! close=last, volume=sum.

use mqk_schemas::Bar;

/// Resample `bars` (assumed sorted ascending by `ts`, all at `source_secs`
/// granularity) into buckets of `target_secs` width, aligned to UTC epoch.
///
/// Returns one output bar per bucket that has at least one input bar;
/// `target_secs` must be an integer multiple of `source_secs` or the
/// resulting bars mix partial buckets, so callers should only resample to a
/// compatible coarser rule (e.g. `2h` from `1h`, never `90m` from `1h`).
pub fn resample(bars: &[Bar], target_secs: i64) -> Vec<Bar> {
    if bars.is_empty() || target_secs <= 0 {
        return Vec::new();
    }

    let mut out: Vec<Bar> = Vec::new();
    let mut bucket_start = bucket_floor(bars[0].ts, target_secs);
    let mut bucket: Vec<&Bar> = Vec::new();

    for bar in bars {
        let this_bucket = bucket_floor(bar.ts, target_secs);
        if this_bucket != bucket_start {
            if let Some(agg) = aggregate(&bucket, bucket_start + target_secs - 1) {
                out.push(agg);
            }
            bucket.clear();
            bucket_start = this_bucket;
        }
        bucket.push(bar);
    }

    if let Some(agg) = aggregate(&bucket, bucket_start + target_secs - 1) {
        out.push(agg);
    }

    out
}

fn bucket_floor(ts: i64, width_secs: i64) -> i64 {
    ts - ts.rem_euclid(width_secs)
}

fn aggregate(bucket: &[&Bar], end_ts: i64) -> Option<Bar> {
    let first = *bucket.first()?;
    let last = *bucket.last()?;
    let high = bucket.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = bucket.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let volume: f64 = bucket.iter().map(|b| b.volume).sum();

    Some(Bar {
        ts: end_ts,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    })
}

/// Parse an interval string like `"1h"`, `"2h"`, `"1d"`, `"15m"` into seconds.
pub fn interval_secs(interval: &str) -> Option<i64> {
    let interval = interval.trim();
    let (num_part, unit) = interval.split_at(interval.len().checked_sub(1)?);
    let n: i64 = num_part.parse().ok()?;
    match unit {
        "m" => Some(n * 60),
        "h" => Some(n * 3600),
        "d" => Some(n * 86400),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64) -> Bar {
        Bar {
            ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn resample_1h_to_2h_aggregates_first_max_min_last_sum() {
        let bars = vec![bar(0, 10.0), bar(3600, 12.0), bar(7200, 9.0), bar(10800, 11.0)];
        let out = resample(&bars, 7200);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].open, 10.0);
        assert_eq!(out[0].high, 12.0);
        assert_eq!(out[0].low, 10.0);
        assert_eq!(out[0].close, 12.0);
        assert_eq!(out[0].volume, 2.0);
    }

    #[test]
    fn interval_secs_parses_common_units() {
        assert_eq!(interval_secs("1h"), Some(3600));
        assert_eq!(interval_secs("2h"), Some(7200));
        assert_eq!(interval_secs("1d"), Some(86400));
        assert_eq!(interval_secs("15m"), Some(900));
        assert_eq!(interval_secs("bogus"), None);
    }
}
