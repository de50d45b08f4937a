pub mod classify;
pub mod config;
pub mod enrichment;
pub mod history;
pub mod item;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod selection;
pub mod testing;

pub use classify::{classify, AssetBucket, Classification, ClassificationCounts, ReachabilityBucket};
pub use config::{
    load_config, load_config_from_str, validate_config, CapabilitiesConfig, Config, ConfigError,
    DatabaseConfig, RetryConfig, SanitizedConfig, ServerConfig,
};
pub use enrichment::{
    Capabilities, CapabilityError, HttpReachabilityChecker, RemoteCapabilityClient,
};
pub use history::{
    HistoryError, HistoryFilter, HistoryStore, RunHistoryRecord, RunHistoryRecorder,
    SqliteHistoryStore,
};
pub use item::{ItemArena, ItemStatus, ItemStore, ItemUpdate, SqliteItemStore, WorkItem};
pub use pipeline::{PipelineReport, PipelineRun, PipelineRunner, StageKind, StageResult, StageStatus};
pub use scheduler::{
    BatchConfig, BatchMode, BatchProgress, BatchScheduler, BatchSummary, EnrichmentProcessor,
    ItemProcessor,
};
pub use selection::{select, EmptySelection, RunSelection};
