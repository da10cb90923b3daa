//! 条件/事件网的执行: 单步引擎、单次运行与批量驱动.
pub mod batch;
pub mod engine;
pub mod trial;

use thiserror::Error;

pub use batch::{BatchConfig, BatchOutcome, BatchStatistics, LabelStats, run_batch, run_batch_with};
pub use engine::{EnabledBus, FiredSources, FiringEngine, Step};
pub use trial::{StepRecord, Trace, render_snapshot, run_story, run_trial};

/// 驱动层配置错误, 在任何运行开始之前报告.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    #[error("trial count must be positive")]
    ZeroTrials,
    #[error("step budget must be positive")]
    ZeroSteps,
}
