pub mod aggregate;
pub mod config;
pub mod pace;
pub mod path;
pub mod stats;
pub mod storage;
pub mod tracker;

// Re-exports for convenience
pub use config::{ConfigError, TrackerConfigExt};
pub use goldpath_types::{
    ChapterView, CheckpointView, LastRun, PaceSignal, RollingAverageSeries, RoomView,
    TrackerConfig, TrackerState,
};
pub use pace::{PacePolicy, PacePredictor};
pub use path::{
    ChapterMeta, CheckpointInfo, PathInfo, PathRecorder, PathSegment, PathSegmentList, RoomInfo,
};
pub use stats::{ChapterStats, ChapterStatsList, GoldenType, RoomStats};
pub use storage::{Storage, StorageError, TrackerStateFile};
pub use tracker::Tracker;
