//! 单次运行: 从初始标识出发, 在步数预算内推进引擎直至静止.
//!
//! 可以给出一个故事 (标签序列): 每步优先仲裁故事中下一个标签的总线,
//! 该标签发生后故事前进一格; 故事走完后退回普通的随机仲裁.
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::net::{Marking, MarkingSnapshot, Net, TransitionId};
use crate::sim::SimError;
use crate::sim::engine::{FiredSources, FiringEngine};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 从 1 开始的步号
    pub step: usize,
    pub fired_labels: Vec<String>,
    pub fired_instances: Vec<TransitionId>,
    pub marking: MarkingSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub seed: u64,
    pub steps: Vec<StepRecord>,
    /// 运行结束时是否已没有可激发的总线
    pub quiescent: bool,
    pub final_marking: MarkingSnapshot,
    /// 故事中已经发生的标签数
    #[serde(default)]
    pub story_progress: usize,
}

impl Trace {
    /// 到达静止前发生的步数; 预算耗尽时仍有可激发总线则为 `None`.
    pub fn steps_to_quiescence(&self) -> Option<usize> {
        self.quiescent.then_some(self.steps.len())
    }

    /// 形如 `{a, out}` 的终态标识.
    pub fn final_marking_label(&self) -> String {
        render_snapshot(&self.final_marking)
    }

    /// 以 ` -> ` 连接的发生序列, 同一步发生的多条总线以 `+` 连接.
    pub fn path(&self) -> String {
        self.steps
            .iter()
            .map(|record| record.fired_labels.join("+"))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

pub fn render_snapshot(snapshot: &MarkingSnapshot) -> String {
    let marked = snapshot
        .iter()
        .filter_map(|(name, marked)| marked.then_some(name.as_str()))
        .collect::<Vec<_>>();
    format!("{{{}}}", marked.join(", "))
}

/// 以给定种子运行一次, 至多 `steps` 步.
pub fn run_trial(net: &Net, steps: usize, seed: u64) -> Result<Trace, SimError> {
    if steps == 0 {
        return Err(SimError::ZeroSteps);
    }
    let engine = FiringEngine::new(net);
    Ok(run_with_engine(&engine, steps, seed, &[]))
}

/// 按故事运行: `story` 中的标签依次被优先仲裁.
/// 下一个标签在某步不可激发时, 该步照常随机仲裁, 故事原地等待.
pub fn run_story<S>(net: &Net, steps: usize, seed: u64, story: &[S]) -> Result<Trace, SimError>
where
    S: AsRef<str>,
{
    if steps == 0 {
        return Err(SimError::ZeroSteps);
    }
    let story = story.iter().map(AsRef::as_ref).collect::<Vec<_>>();
    let engine = FiringEngine::new(net);
    let trace = run_with_engine(&engine, steps, seed, &story);
    if trace.story_progress < story.len() {
        log::warn!(
            "seed {}: story stalled at '{}' ({} of {} labels fired)",
            seed,
            story[trace.story_progress],
            trace.story_progress,
            story.len()
        );
    }
    Ok(trace)
}

/// 引擎已构造且预算已校验时使用; 批量驱动在各工作线程间共享同一个引擎.
pub(crate) fn run_with_engine(
    engine: &FiringEngine<'_>,
    steps: usize,
    seed: u64,
    story: &[&str],
) -> Trace {
    let net = engine.net();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut marking = Marking::initial(net);
    let mut fired = FiredSources::new();
    let mut records = Vec::new();
    let mut quiescent = false;
    let mut progress = 0;

    for index in 1..=steps {
        let next = story.get(progress).copied();
        let Some(step) = engine.step_preferring(&mut marking, &mut fired, &mut rng, next) else {
            log::debug!("seed {}: quiescent after {} steps", seed, index - 1);
            quiescent = true;
            break;
        };
        log::debug!("seed {}: step {} fired [{}]", seed, index, step.labels.join(", "));
        if next.is_some_and(|label| step.labels.iter().any(|fired| fired == label)) {
            progress += 1;
        }
        records.push(StepRecord {
            step: index,
            fired_labels: step.labels,
            fired_instances: step.instances,
            marking: marking.snapshot(net),
        });
    }

    if !quiescent {
        quiescent = engine.is_quiescent(&marking, &fired);
    }

    Trace {
        seed,
        steps: records,
        quiescent,
        final_marking: marking.snapshot(net),
        story_progress: progress,
    }
}
