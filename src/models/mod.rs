mod breadth;
mod distribution;
mod extremum;
mod instrument;
mod snapshot;

pub use breadth::{AverageStats, DailyBreadthStats};
pub use distribution::{Band, BandConfig, BucketStat, DistributionSnapshot, Side};
pub use extremum::{
    HighRiseStock, HighestCheck, HistoryPoint, NearHighStock, WindowSpec, WindowStat,
};
pub use instrument::{CalendarDay, InstrumentRow};
pub use snapshot::{SnapshotKind, UnifiedSnapshot};
