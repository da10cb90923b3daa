//! 批量随机模拟: N 次相互独立的运行及其聚合统计.
//!
//! 各次运行只共享只读的 [`Net`] 与 [`FiringEngine`], 标识、已发生源迁移集合
//! 和随机源均为运行私有, 因而直接交给 rayon 并行执行.
use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::net::Net;
use crate::sim::SimError;
use crate::sim::engine::FiringEngine;
use crate::sim::trial::{Trace, run_with_engine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub trials: usize,
    pub steps: usize,
    /// 主种子; 第 `i` 次运行使用 `seed + i`. 缺省时每次运行取新的系统熵.
    pub seed: Option<u64>,
}

impl BatchConfig {
    pub fn new(trials: usize, steps: usize) -> Self {
        Self {
            trials,
            steps,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.trials == 0 {
            return Err(SimError::ZeroTrials);
        }
        if self.steps == 0 {
            return Err(SimError::ZeroSteps);
        }
        Ok(())
    }

    fn trial_seed(&self, trial: usize) -> u64 {
        match self.seed {
            Some(seed) => seed.wrapping_add(trial as u64),
            None => rand::random(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelStats {
    /// 至少发生过一次的运行数
    pub trials_fired: usize,
    /// 首次发生步号的均值 (仅统计发生过的运行)
    pub mean_first_fire_step: Option<f64>,
    /// 所有运行中该总线发生的步数之和
    pub total_firings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub trials: usize,
    pub steps: usize,
    pub quiescent_trials: usize,
    pub mean_steps_to_quiescence: Option<f64>,
    /// 网中每个标签一项, 按首次出现顺序
    pub labels: IndexMap<String, LabelStats>,
    /// 终态标识分布, 频次降序
    pub final_markings: Vec<(String, usize)>,
}

impl BatchStatistics {
    pub fn from_traces(net: &Net, steps: usize, traces: &[Trace]) -> Self {
        let mut first_steps: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut totals: HashMap<&str, usize> = HashMap::new();

        for trace in traces {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for record in &trace.steps {
                for label in &record.fired_labels {
                    seen.entry(label.as_str()).or_insert(record.step);
                    *totals.entry(label.as_str()).or_default() += 1;
                }
            }
            for (label, step) in seen {
                first_steps.entry(label).or_default().push(step);
            }
        }

        let labels = net
            .labels()
            .map(|label| {
                let firsts = first_steps.get(label).map(Vec::as_slice).unwrap_or(&[]);
                let stats = LabelStats {
                    trials_fired: firsts.len(),
                    mean_first_fire_step: mean(firsts.iter().copied()),
                    total_firings: totals.get(label).copied().unwrap_or(0),
                };
                (label.to_string(), stats)
            })
            .collect();

        let quiescence = traces
            .iter()
            .filter_map(Trace::steps_to_quiescence)
            .collect::<Vec<_>>();

        let final_markings = traces
            .iter()
            .map(Trace::final_marking_label)
            .counts()
            .into_iter()
            .sorted_by(|(a, ca), (b, cb)| cb.cmp(ca).then_with(|| a.cmp(b)))
            .collect();

        Self {
            trials: traces.len(),
            steps,
            quiescent_trials: quiescence.len(),
            mean_steps_to_quiescence: mean(quiescence.iter().copied()),
            labels,
            final_markings,
        }
    }

    /// 在多少比例的运行中发生过.
    pub fn fire_ratio(&self, label: &str) -> Option<f64> {
        let stats = self.labels.get(label)?;
        (self.trials > 0).then(|| stats.trials_fired as f64 / self.trials as f64)
    }
}

fn mean(values: impl Iterator<Item = usize>) -> Option<f64> {
    let (sum, count) = values.fold((0usize, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub traces: Vec<Trace>,
    pub statistics: BatchStatistics,
}

pub fn run_batch(net: &Net, trials: usize, steps: usize) -> Result<BatchOutcome, SimError> {
    run_batch_with(net, &BatchConfig::new(trials, steps))
}

pub fn run_batch_with(net: &Net, config: &BatchConfig) -> Result<BatchOutcome, SimError> {
    config.validate()?;
    log::info!(
        "running {} trials of at most {} steps{}",
        config.trials,
        config.steps,
        config
            .seed
            .map(|seed| format!(" (master seed {seed})"))
            .unwrap_or_default()
    );

    let engine = FiringEngine::new(net);
    let traces = (0..config.trials)
        .into_par_iter()
        .map(|trial| run_with_engine(&engine, config.steps, config.trial_seed(trial), &[]))
        .collect::<Vec<_>>();

    let statistics = BatchStatistics::from_traces(net, config.steps, &traces);
    log::info!(
        "{} of {} trials reached quiescence",
        statistics.quiescent_trials,
        statistics.trials
    );
    Ok(BatchOutcome { traces, statistics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ArcKind, Statement, build_net};

    fn net(statements: &[Statement]) -> Net {
        let (net, errors) = build_net(statements);
        assert!(errors.is_empty(), "{errors:?}");
        net
    }

    fn fork() -> Net {
        net(&[
            Statement::clause("left", [(ArcKind::Consume, "p"), (ArcKind::Produce, "l")]),
            Statement::clause("right", [(ArcKind::Consume, "p"), (ArcKind::Produce, "r")]),
            Statement::clause("idle", [(ArcKind::Consume, "never")]),
            Statement::factual(["p"]),
        ])
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let net = fork();
        assert_eq!(run_batch(&net, 0, 10), Err(SimError::ZeroTrials));
        assert_eq!(run_batch(&net, 10, 0), Err(SimError::ZeroSteps));
    }

    #[test]
    fn fork_statistics_add_up() {
        let net = fork();
        let config = BatchConfig::new(200, 5).with_seed(99);
        let outcome = run_batch_with(&net, &config).unwrap();
        let stats = &outcome.statistics;

        assert_eq!(outcome.traces.len(), 200);
        assert_eq!(stats.trials, 200);
        assert_eq!(stats.quiescent_trials, 200);
        assert_eq!(stats.mean_steps_to_quiescence, Some(1.0));

        let left = &stats.labels["left"];
        let right = &stats.labels["right"];
        assert_eq!(left.trials_fired + right.trials_fired, 200);
        assert!(left.trials_fired > 0 && right.trials_fired > 0);
        assert_eq!(left.mean_first_fire_step, Some(1.0));
        assert_eq!(stats.labels["idle"], LabelStats::default());
        assert_eq!(
            stats.labels.keys().collect::<Vec<_>>(),
            vec!["left", "right", "idle"]
        );

        let total: usize = stats.final_markings.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 200);
        assert_eq!(stats.final_markings.len(), 2);
        assert!(stats.final_markings[0].1 >= stats.final_markings[1].1);
    }

    #[test]
    fn master_seed_makes_batches_reproducible() {
        let net = fork();
        let config = BatchConfig::new(32, 4).with_seed(7);
        let first = run_batch_with(&net, &config).unwrap();
        let second = run_batch_with(&net, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.traces[3].seed, 10);
    }

    #[test]
    fn unseeded_trials_still_aggregate() {
        let net = net(&[
            Statement::clause("t", [(ArcKind::Catalyst, "c")]),
            Statement::factual(["c"]),
        ]);
        let outcome = run_batch(&net, 8, 3).unwrap();
        let stats = &outcome.statistics;

        assert_eq!(stats.quiescent_trials, 0);
        assert_eq!(stats.mean_steps_to_quiescence, None);
        assert_eq!(stats.labels["t"].trials_fired, 8);
        assert_eq!(stats.labels["t"].total_firings, 24);
        assert_eq!(stats.fire_ratio("t"), Some(1.0));
        assert_eq!(stats.fire_ratio("missing"), None);
    }

    #[test]
    fn first_fire_step_is_averaged() {
        let net = net(&[
            Statement::clause("a", [(ArcKind::Consume, "p"), (ArcKind::Produce, "q")]),
            Statement::clause("b", [(ArcKind::Consume, "q"), (ArcKind::Produce, "r")]),
            Statement::factual(["p"]),
        ]);
        let outcome = run_batch(&net, 4, 10).unwrap();
        let stats = &outcome.statistics;

        assert_eq!(stats.labels["a"].mean_first_fire_step, Some(1.0));
        assert_eq!(stats.labels["b"].mean_first_fire_step, Some(2.0));
        assert_eq!(stats.mean_steps_to_quiescence, Some(2.0));
        assert_eq!(stats.final_markings, vec![("{r}".to_string(), 4)]);
    }
}
