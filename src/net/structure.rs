//! 条件/事件网静态结构元素：库所、迁移、弧与布尔标识。
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::core::Net;
use crate::net::ids::{ArcId, PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;

/// 库所：唯一标签 + 是否属于初始标识（factual）。
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    pub factual: bool,
}

impl Place {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factual: false,
        }
    }

    pub fn new_factual(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factual: true,
        }
    }
}

/// 迁移实例。`name` 仅用于总线分组，实例身份由 `TransitionId` 决定。
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub name: String,
    pub arcs: SmallVec<[ArcId; 4]>,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arcs: SmallVec::new(),
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition")
            .field(&self.name)
            .field(&self.arcs.len())
            .finish()
    }
}

/// 弧类型。
///
/// * `Consume`：库所必须有托肯，发生后清除；
/// * `Produce`：发生后置位；
/// * `Catalyst`：库所必须有托肯，发生后保持不变（只读依赖）；
/// * `Inhibit`：库所必须无托肯，发生不改变该库所。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArcKind {
    Consume,
    Produce,
    Catalyst,
    Inhibit,
}

impl ArcKind {
    /// 该弧是否参与"可激发"判定中的正向条件。
    pub fn requires_token(self) -> bool {
        matches!(self, ArcKind::Consume | ArcKind::Catalyst)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArcKind::Consume => "consume",
            ArcKind::Produce => "produce",
            ArcKind::Catalyst => "catalyst",
            ArcKind::Inhibit => "inhibit",
        }
    }
}

impl fmt::Display for ArcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Arc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub kind: ArcKind,
}

impl Arc {
    pub fn new(place: PlaceId, transition: TransitionId, kind: ArcKind) -> Self {
        Self {
            place,
            transition,
            kind,
        }
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arc")
            .field("place", &self.place)
            .field("transition", &self.transition)
            .field("kind", &self.kind)
            .finish()
    }
}

/// 库所标签到布尔值的有序映射，供报告与回放使用。
pub type MarkingSnapshot = IndexMap<String, bool>;

/// 布尔标识：每个库所要么持有托肯，要么不持有。
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marking(pub IndexVec<PlaceId, bool>);

impl Marking {
    /// 由网的 factual 库所集合构造初始标识。
    pub fn initial(net: &Net) -> Self {
        Self(net.places.iter().map(|place| place.factual).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, bool)> {
        self.0.iter_enumerated().map(|(place, marked)| (place, *marked))
    }

    pub fn is_marked(&self, place: PlaceId) -> bool {
        self.0[place]
    }

    pub fn set(&mut self, place: PlaceId, marked: bool) {
        self.0[place] = marked;
    }

    pub fn marked_places(&self) -> impl Iterator<Item = PlaceId> {
        self.iter().filter_map(|(place, marked)| marked.then_some(place))
    }

    pub fn snapshot(&self, net: &Net) -> MarkingSnapshot {
        net.places
            .iter_enumerated()
            .map(|(id, place)| (place.name.clone(), self.is_marked(id)))
            .collect()
    }

    /// 形如 `{a, out}` 的紧凑表示，只列出被标记的库所。
    pub fn render(&self, net: &Net) -> String {
        let names = self
            .marked_places()
            .map(|place| net.places[place].name.as_str())
            .collect::<Vec<_>>();
        format!("{{{}}}", names.join(", "))
    }
}

impl Hash for Marking {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in self.0.iter() {
            value.hash(state);
        }
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, marked) in self.iter() {
            map.entry(&place, &marked);
        }
        map.finish()
    }
}
