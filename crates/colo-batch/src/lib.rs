pub mod cancel;
pub mod grid;
pub mod job;
pub mod manifest;
pub mod runner;
pub mod table;

pub use cancel::SweepCancellation;
pub use grid::{SweepGrid, SweepPoint, SweepRange};
pub use job::{jobs_from_points, PointMetrics, PointStatus, ScenarioTemplate, SweepJob, SweepRecord};
pub use manifest::{BestPoint, SweepAxes, SweepManifest};
pub use runner::{
    evaluate_jobs, evaluate_jobs_with, run_sweep, SweepRunnerConfig, SweepSummary, MANIFEST_FILE,
    TABLE_FILE,
};
pub use table::{fixed, StatusCounts, SweepComparison, SweepTable, TopologyBest};
