//! Feature/Snapshot builder (C2): turns a bar series into one [`SnapshotRow`]
//! per symbol. Pure functions over `&[Bar]` — no I/O.

use mqk_schemas::{classify_symbol_theme, Bar, SnapshotRow};

/// Minimum bar count required to compute a snapshot row (§4.2).
pub const MIN_BARS: usize = 60;

/// Build a [`SnapshotRow`] for one symbol from its bar history. Returns
/// `None` when there is insufficient data (`bars.len() < MIN_BARS`), per
/// §4.2 ("Rows with insufficient data are dropped").
pub fn build_snapshot(symbol: &str, bars: &[Bar]) -> Option<SnapshotRow> {
    if bars.len() < MIN_BARS {
        return None;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let ema20 = ema_series(&closes, 20);
    let ema50 = ema_series(&closes, 50);
    let last_ema20 = *ema20.last()?;
    let last_ema50 = *ema50.last()?;

    let atr_pct_series = atr_pct_series(bars, 14)?;
    if atr_pct_series.len() < 20 {
        return None;
    }
    let last_atr_pct = *atr_pct_series.last()?;
    let trailing_20_atr: &[f64] = &atr_pct_series[atr_pct_series.len() - 20..atr_pct_series.len()];
    let mean_atr_20 = mean(trailing_20_atr);
    let atr_expansion = if mean_atr_20 > 0.0 {
        last_atr_pct / mean_atr_20
    } else {
        0.0
    };

    let n = closes.len();
    let close = closes[n - 1];
    let volume = volumes[n - 1];
    let amount = close * volume;

    let ret_1_pct = pct_change(closes[n - 1], closes[n - 2]);
    let ret_4_pct = pct_change(closes[n - 1], closes[n - 5]);

    let trailing_20_vol = &volumes[n - 20..n];
    let mean_vol_20 = mean(trailing_20_vol);
    let volume_ratio_20 = if mean_vol_20 > 0.0 {
        volume / mean_vol_20
    } else {
        0.0
    };

    let trend_gap_pct = if last_ema50.abs() > f64::EPSILON {
        (last_ema20 / last_ema50 - 1.0) * 100.0
    } else {
        0.0
    };

    // bars[-21:-1] in Python slicing: the 20 bars preceding the current one.
    let breakout_pct = if n >= 21 {
        let window = &bars[n - 21..n - 1];
        let ref_high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        if ref_high > 0.0 {
            (close / ref_high - 1.0) * 100.0
        } else {
            -999.0
        }
    } else {
        -999.0
    };

    Some(SnapshotRow {
        symbol: symbol.to_string(),
        close,
        volume,
        amount,
        ret_1_pct,
        ret_4_pct,
        volume_ratio_20,
        atr_pct: last_atr_pct,
        atr_expansion,
        trend_gap_pct,
        breakout_pct,
        ema20_gt_ema50: last_ema20 > last_ema50,
        theme: classify_symbol_theme(symbol).as_str().to_string(),
    })
}

fn pct_change(current: f64, previous: f64) -> f64 {
    if previous.abs() < f64::EPSILON {
        0.0
    } else {
        (current / previous - 1.0) * 100.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Exponential moving average with the given span, matching pandas'
/// `ewm(span=N).mean()` recursion: `alpha = 2 / (N + 1)`.
fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Per-bar true range, then a simple rolling mean over `period` bars,
/// divided by that bar's close. Returns one `atr_pct` value per bar once
/// enough history has accumulated (index `period` onward).
fn atr_pct_series(bars: &[Bar], period: usize) -> Option<Vec<f64>> {
    if bars.len() <= period {
        return None;
    }

    let mut true_ranges = Vec::with_capacity(bars.len());
    for i in 1..bars.len() {
        let high = bars[i].high;
        let low = bars[i].low;
        let prev_close = bars[i - 1].close;
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        true_ranges.push(tr);
    }
    // true_ranges[k] corresponds to bars[k + 1].

    let mut out = Vec::new();
    for i in period..bars.len() {
        // Window of `period` true-range values ending at bar i (inclusive),
        // i.e. true_ranges[i - period .. i] (since true_ranges is offset by one).
        let window = &true_ranges[i - period..i];
        let atr_abs = mean(window);
        let close = bars[i].close;
        let atr_pct = if close.abs() > f64::EPSILON {
            atr_abs / close
        } else {
            0.0
        };
        out.push(atr_pct);
    }

    Some(out)
}
