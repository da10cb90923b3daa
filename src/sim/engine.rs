//! 运行时: 局部可激发集、总线分组、冲突仲裁与发生语义.
//!
//! 一步的流程:
//! 1. 对每个迁移实例判定局部可激发;
//! 2. 按标签分组为总线, 至少含一个可激发实例的总线即为可激发;
//! 3. 用本次运行的随机源打乱总线顺序, 依次接纳实例, 与已预留的 Consume
//!    库所相交的实例本步跳过, 得到极大的无冲突集合; 给定优先标签且该总线
//!    可激发时, 它被移到最前, 必然发生;
//! 4. 相对步首标识统一生效: 先清除全部 Consume 库所, 再置位全部 Produce 库所;
//! 5. 被接纳的源迁移记入 [`FiredSources`], 本次运行内不再可激发.
use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use smallvec::SmallVec;

use crate::net::{ArcKind, IndexVec, Marking, Net, PlaceId, TransitionId};

type PlaceSet = SmallVec<[PlaceId; 4]>;

/// 每个迁移实例按弧类型拆开的库所列表, 在引擎构造时计算一次.
#[derive(Debug, Clone, Default)]
struct Preset {
    consume: PlaceSet,
    catalyst: PlaceSet,
    inhibit: PlaceSet,
    produce: PlaceSet,
}

impl Preset {
    fn is_source(&self) -> bool {
        self.consume.is_empty() && self.catalyst.is_empty()
    }
}

/// 本次运行中已经发生过的源迁移实例.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiredSources(HashSet<TransitionId>);

impl FiredSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, transition: TransitionId) -> bool {
        self.0.contains(&transition)
    }

    pub fn insert(&mut self, transition: TransitionId) -> bool {
        self.0.insert(transition)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 可激发的总线及其局部可激发的实例 (按实例编号升序).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledBus<'net> {
    pub label: &'net str,
    pub instances: Vec<TransitionId>,
}

/// 一步的结果: 按仲裁顺序发生的总线标签与实例.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub labels: Vec<String>,
    pub instances: Vec<TransitionId>,
}

pub struct FiringEngine<'net> {
    net: &'net Net,
    presets: IndexVec<TransitionId, Preset>,
}

impl<'net> FiringEngine<'net> {
    pub fn new(net: &'net Net) -> Self {
        let presets = net
            .transitions
            .indices()
            .map(|transition| {
                let mut preset = Preset::default();
                for arc in net.arcs_of(transition) {
                    let bucket = match arc.kind {
                        ArcKind::Consume => &mut preset.consume,
                        ArcKind::Catalyst => &mut preset.catalyst,
                        ArcKind::Inhibit => &mut preset.inhibit,
                        ArcKind::Produce => &mut preset.produce,
                    };
                    bucket.push(arc.place);
                }
                preset
            })
            .collect();
        Self { net, presets }
    }

    pub fn net(&self) -> &'net Net {
        self.net
    }

    pub fn is_source(&self, transition: TransitionId) -> bool {
        self.presets[transition].is_source()
    }

    pub fn is_locally_enabled(
        &self,
        transition: TransitionId,
        marking: &Marking,
        fired: &FiredSources,
    ) -> bool {
        let preset = &self.presets[transition];
        if preset.is_source() && fired.contains(transition) {
            return false;
        }
        preset
            .consume
            .iter()
            .chain(preset.catalyst.iter())
            .all(|place| marking.is_marked(*place))
            && !preset.inhibit.iter().any(|place| marking.is_marked(*place))
    }

    pub fn enabled_instances(&self, marking: &Marking, fired: &FiredSources) -> Vec<TransitionId> {
        self.net
            .transitions
            .indices()
            .filter(|transition| self.is_locally_enabled(*transition, marking, fired))
            .collect()
    }

    /// 可激发总线, 按标签首次出现的顺序.
    pub fn enabled_buses(&self, marking: &Marking, fired: &FiredSources) -> Vec<EnabledBus<'net>> {
        self.net
            .buses
            .iter()
            .filter_map(|(label, members)| {
                let instances = members
                    .iter()
                    .copied()
                    .filter(|transition| self.is_locally_enabled(*transition, marking, fired))
                    .collect::<Vec<_>>();
                (!instances.is_empty()).then(|| EnabledBus {
                    label: label.as_str(),
                    instances,
                })
            })
            .collect()
    }

    pub fn is_quiescent(&self, marking: &Marking, fired: &FiredSources) -> bool {
        !self
            .net
            .transitions
            .indices()
            .any(|transition| self.is_locally_enabled(transition, marking, fired))
    }

    /// 推进一步. 没有可激发总线时返回 `None` (静止), 标识保持不变.
    pub fn step<R>(
        &self,
        marking: &mut Marking,
        fired: &mut FiredSources,
        rng: &mut R,
    ) -> Option<Step>
    where
        R: Rng + ?Sized,
    {
        self.step_preferring(marking, fired, rng, None)
    }

    /// 同 [`FiringEngine::step`], 但 `preferred` 总线可激发时优先仲裁.
    /// 随机源的消耗与 `step` 相同.
    pub fn step_preferring<R>(
        &self,
        marking: &mut Marking,
        fired: &mut FiredSources,
        rng: &mut R,
        preferred: Option<&str>,
    ) -> Option<Step>
    where
        R: Rng + ?Sized,
    {
        let mut buses = self.enabled_buses(marking, fired);
        if buses.is_empty() {
            return None;
        }
        buses.shuffle(rng);
        if let Some(label) = preferred {
            if let Some(at) = buses.iter().position(|bus| bus.label == label) {
                let bus = buses.remove(at);
                buses.insert(0, bus);
            }
        }

        let accepted = self.arbitrate(&buses);
        self.apply(&accepted.instances, marking);

        for transition in &accepted.instances {
            if self.is_source(*transition) {
                fired.insert(*transition);
            }
        }
        Some(accepted)
    }

    /// 按给定顺序接纳实例, 跳过与已预留 Consume 库所相交的实例.
    fn arbitrate(&self, buses: &[EnabledBus<'_>]) -> Step {
        let mut reserved = IndexVec::<PlaceId, bool>::from_elem(false, self.net.places_len());
        let mut step = Step::default();

        for bus in buses {
            let mut bus_fired = false;
            for transition in &bus.instances {
                let consume = &self.presets[*transition].consume;
                if consume.iter().any(|place| reserved[*place]) {
                    log::debug!(
                        "instance {} of bus '{}' displaced by conflict",
                        transition,
                        bus.label
                    );
                    continue;
                }
                for place in consume {
                    reserved[*place] = true;
                }
                step.instances.push(*transition);
                bus_fired = true;
            }
            if bus_fired {
                step.labels.push(bus.label.to_string());
            }
        }
        step
    }

    fn apply(&self, instances: &[TransitionId], marking: &mut Marking) {
        for transition in instances {
            for place in &self.presets[*transition].consume {
                marking.set(*place, false);
            }
        }
        for transition in instances {
            for place in &self.presets[*transition].produce {
                marking.set(*place, true);
            }
        }
    }
}
