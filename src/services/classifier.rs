use crate::models::{Band, BandConfig, BucketStat, InstrumentRow, Side};
use crate::utils::round2;

/// Bucket one side of the market into the configured magnitude bands.
///
/// Rows at or beyond the limit threshold belong exclusively to the limit
/// bucket and are never counted in a generic band, including the unbounded
/// one. Percentages are shares of the full universe (`rows.len()`), so the
/// rise and fall outputs of the same day are comparable.
pub fn classify(rows: &[InstrumentRow], side: Side, config: &BandConfig) -> Vec<BucketStat> {
    let total = rows.len();

    let magnitudes: Vec<f64> = rows
        .iter()
        .filter(|r| match side {
            Side::Rise => r.pct_chg > 0.0,
            Side::Fall => r.pct_chg < 0.0,
        })
        .map(|r| r.pct_chg.abs())
        .collect();

    let mut buckets: Vec<BucketStat> = config
        .bands
        .iter()
        .map(|band| bucket(band, &magnitudes, config.limit_threshold, total))
        .collect();

    let limit_count = magnitudes
        .iter()
        .filter(|&&m| m >= config.limit_threshold)
        .count() as i64;
    buckets.push(BucketStat {
        label: config.limit_label.clone(),
        count: limit_count,
        percentage: share(limit_count, total),
    });

    buckets
}

fn bucket(band: &Band, magnitudes: &[f64], limit_threshold: f64, total: usize) -> BucketStat {
    let count = magnitudes
        .iter()
        .filter(|&&m| {
            m < limit_threshold && m >= band.min && band.max.map_or(true, |max| m < max)
        })
        .count() as i64;
    BucketStat {
        label: band.label.clone(),
        count,
        percentage: share(count, total),
    }
}

fn share(count: i64, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(count as f64 / total as f64 * 100.0)
    }
}
