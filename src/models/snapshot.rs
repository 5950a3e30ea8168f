use super::breadth::{AverageStats, DailyBreadthStats};
use super::distribution::BucketStat;
use serde::{Deserialize, Serialize};

/// The dataset kinds persisted by the snapshot store, one record set per
/// `(date, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Breadth,
    Distribution,
    HighRise,
    Unified,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 4] = [
        SnapshotKind::Breadth,
        SnapshotKind::Distribution,
        SnapshotKind::HighRise,
        SnapshotKind::Unified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Breadth => "breadth",
            SnapshotKind::Distribution => "distribution",
            SnapshotKind::HighRise => "high_rise",
            SnapshotKind::Unified => "unified",
        }
    }
}

impl std::str::FromStr for SnapshotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breadth" => Ok(SnapshotKind::Breadth),
            "distribution" => Ok(SnapshotKind::Distribution),
            "high_rise" => Ok(SnapshotKind::HighRise),
            "unified" => Ok(SnapshotKind::Unified),
            other => Err(format!(
                "unknown snapshot kind '{}' (expected breadth, distribution, high_rise, unified)",
                other
            )),
        }
    }
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The composed per-date analysis persisted as one opaque JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedSnapshot {
    pub date: String,
    pub breadth: DailyBreadthStats,
    pub rise: Vec<BucketStat>,
    pub fall: Vec<BucketStat>,
    /// Trailing daily snapshots that actually yielded data, newest first
    pub recent: Vec<DailyBreadthStats>,
    /// Absent when no trailing date yielded data
    pub average: Option<AverageStats>,
}
