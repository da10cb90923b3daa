//! 运行结果的导出与汇总.
pub mod audit;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::net::Net;
use crate::net::io::{self, IoError};
use crate::sim::{BatchOutcome, BatchStatistics, Trace};

pub use audit::{AUDIT_HEADER, write_audit, write_audit_csv};

/// 可供回放的完整批量结果: 网结构、全部轨迹与聚合统计.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceDocument {
    pub net: Net,
    pub traces: Vec<Trace>,
    pub statistics: BatchStatistics,
}

impl TraceDocument {
    pub fn new(net: &Net, outcome: BatchOutcome) -> Self {
        Self {
            net: net.clone(),
            traces: outcome.traces,
            statistics: outcome.statistics,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        let path = path.as_ref();
        io::write_json(path, self)?;
        log::info!("wrote {} traces to {}", self.traces.len(), path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        io::read_json(path)
    }
}

/// 批量统计的文本汇总.
pub struct BatchSummary<'a> {
    pub statistics: &'a BatchStatistics,
    /// 展示的终态标识条数
    pub top: usize,
}

impl<'a> BatchSummary<'a> {
    pub fn new(statistics: &'a BatchStatistics) -> Self {
        Self { statistics, top: 5 }
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for BatchSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.statistics;
        writeln!(
            f,
            "Batch summary: {} trials, at most {} steps each",
            stats.trials, stats.steps
        )?;
        writeln!(
            f,
            "Quiescent trials: {} ({:.1}%), mean steps to quiescence: {}",
            stats.quiescent_trials,
            percent(stats.quiescent_trials, stats.trials),
            optional(stats.mean_steps_to_quiescence)
        )?;

        if !stats.labels.is_empty() {
            let width = stats
                .labels
                .keys()
                .map(|label| label.chars().count())
                .max()
                .unwrap_or(0)
                .max("label".len());
            writeln!(f)?;
            writeln!(
                f,
                "{:<width$}  {:>7}  {:>7}  {:>10}  {:>8}",
                "label", "trials", "ratio", "first step", "firings"
            )?;
            for (label, label_stats) in &stats.labels {
                writeln!(
                    f,
                    "{:<width$}  {:>7}  {:>6.1}%  {:>10}  {:>8}",
                    label,
                    label_stats.trials_fired,
                    percent(label_stats.trials_fired, stats.trials),
                    optional(label_stats.mean_first_fire_step),
                    label_stats.total_firings
                )?;
            }
        }

        if !stats.final_markings.is_empty() {
            writeln!(
                f,
                "\nFinal markings (top {} of {}):",
                self.top.min(stats.final_markings.len()),
                stats.final_markings.len()
            )?;
            for (marking, count) in stats.final_markings.iter().take(self.top) {
                writeln!(
                    f,
                    "  {:>5} ({:>5.1}%)  {}",
                    count,
                    percent(*count, stats.trials),
                    marking
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ArcKind, Statement, build_net};
    use crate::sim::{BatchConfig, run_batch_with};

    fn outcome() -> (Net, BatchOutcome) {
        let (net, _) = build_net(&[
            Statement::clause("left", [(ArcKind::Consume, "p"), (ArcKind::Produce, "l")]),
            Statement::clause("right", [(ArcKind::Consume, "p"), (ArcKind::Produce, "r")]),
            Statement::factual(["p"]),
        ]);
        let outcome = run_batch_with(&net, &BatchConfig::new(50, 4).with_seed(5)).unwrap();
        (net, outcome)
    }

    #[test]
    fn summary_lists_labels_and_markings() {
        let (_, outcome) = outcome();
        let text = BatchSummary::new(&outcome.statistics).to_string();

        assert!(text.starts_with("Batch summary: 50 trials, at most 4 steps each\n"));
        assert!(text.contains("Quiescent trials: 50 (100.0%), mean steps to quiescence: 1.00"));
        assert!(text.lines().any(|line| line.starts_with("left ")));
        assert!(text.lines().any(|line| line.starts_with("right")));
        assert!(text.contains("Final markings (top 2 of 2):"));
        assert!(text.contains("{l}") && text.contains("{r}"));
    }

    #[test]
    fn summary_respects_top() {
        let (_, outcome) = outcome();
        let text = BatchSummary::new(&outcome.statistics).with_top(1).to_string();
        assert!(text.contains("Final markings (top 1 of 2):"));
        assert_eq!(text.lines().filter(|line| line.contains("%)  {")).count(), 1);
    }

    #[test]
    fn trace_document_round_trips_through_disk() {
        let (net, outcome) = outcome();
        let dir = std::env::temp_dir().join(format!("pneu-report-{}", std::process::id()));
        let path = dir.join("nested").join("traces.json");

        let document = TraceDocument::new(&net, outcome);
        document.save(&path).unwrap();
        let back = TraceDocument::load(&path).unwrap();

        assert_eq!(back.traces, document.traces);
        assert_eq!(back.statistics, document.statistics);
        assert_eq!(back.net.places_len(), 3);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
