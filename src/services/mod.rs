pub mod aggregator;
pub mod calendar;
pub mod classifier;
pub mod extremum;
pub mod high_rise;
pub mod provider;
pub mod refresh;
pub mod store;

pub use aggregator::SnapshotAggregator;
pub use calendar::CalendarResolver;
pub use extremum::ExtremumScanner;
pub use high_rise::HighRiseScanner;
pub use provider::{DataProvider, Market, ProApiClient, ReferenceData};
pub use refresh::RefreshCoordinator;
pub use store::SnapshotStore;
