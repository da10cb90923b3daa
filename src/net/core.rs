//! 网的静态图：库所、迁移实例、带类型的弧以及总线索引。
use std::fmt::{self, Write as FmtWrite};
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;

use crate::net::ids::{ArcId, PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Arc, ArcKind, Marking, Place, Transition};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("arc references unknown place {0:?}")]
    DanglingPlace(PlaceId),
    #[error("arc references unknown transition {0:?}")]
    DanglingTransition(TransitionId),
    #[error("arc {0} is missing from the arc index of its place or transition")]
    UnindexedArc(ArcId),
    #[error("arc index entry {0} refers to a missing or foreign arc")]
    MisindexedArc(ArcId),
    #[error("place arc index has {found} entries for {expected} places")]
    PlaceIndexLength { expected: usize, found: usize },
    #[error("bus '{0}' does not match the transition labels")]
    InconsistentBus(String),
}

/// 网连通性诊断报告
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    /// 孤立库所（无任何连接的弧）
    pub isolated_places: Vec<(PlaceId, String)>,
    /// 孤立变迁（无任何连接的弧）
    pub isolated_transitions: Vec<(TransitionId, String)>,
    /// 警告信息
    pub warnings: Vec<String>,
    pub total_places: usize,
    pub total_transitions: usize,
}

impl DiagnosticReport {
    pub fn has_issues(&self) -> bool {
        !self.isolated_places.is_empty()
            || !self.isolated_transitions.is_empty()
            || !self.warnings.is_empty()
    }
}

/// 反序列化时先经 [`Net::validate`] 检查, 不一致的网无法载入.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawNet")]
pub struct Net {
    pub places: IndexVec<PlaceId, Place>,
    pub transitions: IndexVec<TransitionId, Transition>,
    pub arcs: IndexVec<ArcId, Arc>,
    /// 按库所索引的弧
    pub place_arcs: IndexVec<PlaceId, Vec<ArcId>>,
    /// 总线：标签 -> 共享该标签的迁移实例（按首次出现顺序）
    pub buses: IndexMap<String, Vec<TransitionId>>,
}

#[derive(serde::Deserialize)]
struct RawNet {
    places: IndexVec<PlaceId, Place>,
    transitions: IndexVec<TransitionId, Transition>,
    arcs: IndexVec<ArcId, Arc>,
    place_arcs: IndexVec<PlaceId, Vec<ArcId>>,
    buses: IndexMap<String, Vec<TransitionId>>,
}

impl TryFrom<RawNet> for Net {
    type Error = NetError;

    fn try_from(raw: RawNet) -> Result<Self, Self::Error> {
        let net = Net {
            places: raw.places,
            transitions: raw.transitions,
            arcs: raw.arcs,
            place_arcs: raw.place_arcs,
            buses: raw.buses,
        };
        net.validate()?;
        Ok(net)
    }
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("places", &self.places)
            .field("transitions", &self.transitions)
            .field("arcs", &self.arcs)
            .finish()
    }
}

impl Net {
    pub fn empty() -> Self {
        Self {
            places: IndexVec::new(),
            transitions: IndexVec::new(),
            arcs: IndexVec::new(),
            place_arcs: IndexVec::new(),
            buses: IndexMap::new(),
        }
    }

    pub fn add_place(&mut self, place: Place) -> PlaceId {
        let place_id = self.places.push(place);
        self.place_arcs.push(Vec::new());
        place_id
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let label = transition.name.clone();
        let transition_id = self.transitions.push(transition);
        self.buses.entry(label).or_default().push(transition_id);
        transition_id
    }

    /// 添加弧；同一 (库所, 迁移, 类型) 三元组重复声明时返回已有的弧。
    pub fn add_arc(
        &mut self,
        place: PlaceId,
        transition: TransitionId,
        kind: ArcKind,
    ) -> Result<ArcId, NetError> {
        if place.index() >= self.places_len() {
            return Err(NetError::DanglingPlace(place));
        }
        if transition.index() >= self.transitions_len() {
            return Err(NetError::DanglingTransition(transition));
        }
        if let Some(existing) = self.find_arc(place, transition, kind) {
            return Ok(existing);
        }

        let arc_id = self.arcs.push(Arc::new(place, transition, kind));
        self.transitions[transition].arcs.push(arc_id);
        self.place_arcs[place].push(arc_id);
        Ok(arc_id)
    }

    pub fn find_arc(
        &self,
        place: PlaceId,
        transition: TransitionId,
        kind: ArcKind,
    ) -> Option<ArcId> {
        self.transitions.get(transition)?.arcs.iter().copied().find(|id| {
            let arc = &self.arcs[*id];
            arc.place == place && arc.kind == kind
        })
    }

    /// 结构一致性: 弧的端点存在, 两个弧索引与弧表互相对应,
    /// 每个迁移实例恰好属于其标签对应的总线一次.
    pub fn validate(&self) -> Result<(), NetError> {
        if self.place_arcs.len() != self.places_len() {
            return Err(NetError::PlaceIndexLength {
                expected: self.places_len(),
                found: self.place_arcs.len(),
            });
        }

        for (arc_id, arc) in self.arcs.iter_enumerated() {
            let Some(transition) = self.transitions.get(arc.transition) else {
                return Err(NetError::DanglingTransition(arc.transition));
            };
            let Some(place_arcs) = self.place_arcs.get(arc.place) else {
                return Err(NetError::DanglingPlace(arc.place));
            };
            if !transition.arcs.contains(&arc_id) || !place_arcs.contains(&arc_id) {
                return Err(NetError::UnindexedArc(arc_id));
            }
        }

        for (transition_id, transition) in self.transitions.iter_enumerated() {
            for arc_id in &transition.arcs {
                match self.arcs.get(*arc_id) {
                    Some(arc) if arc.transition == transition_id => {}
                    _ => return Err(NetError::MisindexedArc(*arc_id)),
                }
            }
        }
        for (place_id, arcs) in self.place_arcs.iter_enumerated() {
            for arc_id in arcs {
                match self.arcs.get(*arc_id) {
                    Some(arc) if arc.place == place_id => {}
                    _ => return Err(NetError::MisindexedArc(*arc_id)),
                }
            }
        }

        let mut seen = IndexVec::<TransitionId, bool>::from_elem(false, self.transitions_len());
        for (label, members) in &self.buses {
            for transition in members {
                match self.transitions.get(*transition) {
                    Some(t) if t.name == *label && !seen[*transition] => seen[*transition] = true,
                    _ => return Err(NetError::InconsistentBus(label.clone())),
                }
            }
        }
        if let Some((transition, _)) = seen.iter_enumerated().find(|(_, seen)| !**seen) {
            return Err(NetError::InconsistentBus(
                self.transitions[transition].name.clone(),
            ));
        }
        Ok(())
    }

    pub fn place_by_name(&self, name: &str) -> Option<PlaceId> {
        self.places
            .iter_enumerated()
            .find_map(|(id, place)| (place.name == name).then_some(id))
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn arcs_len(&self) -> usize {
        self.arcs.len()
    }

    pub fn arcs_of(&self, transition: TransitionId) -> impl Iterator<Item = &Arc> {
        self.transitions[transition]
            .arcs
            .iter()
            .map(|id| &self.arcs[*id])
    }

    pub fn arcs_at(&self, place: PlaceId) -> impl Iterator<Item = &Arc> {
        self.place_arcs[place].iter().map(|id| &self.arcs[*id])
    }

    pub fn places_of(
        &self,
        transition: TransitionId,
        kind: ArcKind,
    ) -> impl Iterator<Item = PlaceId> {
        self.arcs_of(transition)
            .filter(move |arc| arc.kind == kind)
            .map(|arc| arc.place)
    }

    /// 无 Consume 与 Catalyst 输入的迁移为源迁移，每次运行至多发生一次。
    pub fn is_source(&self, transition: TransitionId) -> bool {
        !self.arcs_of(transition).any(|arc| arc.kind.requires_token())
    }

    pub fn bus(&self, label: &str) -> &[TransitionId] {
        self.buses.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.buses.keys().map(String::as_str)
    }

    pub fn factual_places(&self) -> impl Iterator<Item = PlaceId> {
        self.places
            .iter_enumerated()
            .filter_map(|(id, place)| place.factual.then_some(id))
    }

    pub fn initial_marking(&self) -> Marking {
        Marking::initial(self)
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(&mut dot, "digraph PetriNet {{");
        let _ = writeln!(&mut dot, "    rankdir=LR;");
        let _ = writeln!(&mut dot, "    node [fontname=\"Helvetica\"];");

        for (place_id, place) in self.places.iter_enumerated() {
            let token = if place.factual { "\u{25cf}" } else { " " };
            let _ = writeln!(
                &mut dot,
                "    {} [label=\"{{ {} | {} }}\", shape=Mrecord];",
                place_id,
                escape_label(&place.name),
                token
            );
        }

        for (transition_id, transition) in self.transitions.iter_enumerated() {
            let _ = writeln!(
                &mut dot,
                "    {} [label=\"{}\", shape=box, style=filled, fillcolor=\"#ffe0b2\"];",
                transition_id,
                escape_label(&transition.name)
            );
        }

        for arc in self.arcs.iter() {
            let (place, transition) = (arc.place, arc.transition);
            let _ = match arc.kind {
                ArcKind::Consume => writeln!(&mut dot, "    {} -> {};", place, transition),
                ArcKind::Produce => writeln!(&mut dot, "    {} -> {};", transition, place),
                ArcKind::Catalyst => writeln!(
                    &mut dot,
                    "    {} -> {} [dir=both, style=dashed];",
                    place, transition
                ),
                ArcKind::Inhibit => writeln!(
                    &mut dot,
                    "    {} -> {} [arrowhead=odot];",
                    place, transition
                ),
            };
        }

        let _ = writeln!(&mut dot, "}}");
        dot
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_dot())
    }

    /// 检测孤立节点以及永远无法被标记的库所
    pub fn diagnose(&self) -> DiagnosticReport {
        let mut isolated_places = Vec::new();
        let mut isolated_transitions = Vec::new();
        let mut warnings = Vec::new();

        for (place_id, place) in self.places.iter_enumerated() {
            let arcs = &self.place_arcs[place_id];
            if arcs.is_empty() {
                if !place.factual {
                    isolated_places.push((place_id, place.name.clone()));
                }
                continue;
            }
            let produced = self.arcs_at(place_id).any(|arc| arc.kind == ArcKind::Produce);
            let required = self
                .arcs_at(place_id)
                .any(|arc| arc.kind.requires_token());
            if required && !produced && !place.factual {
                warnings.push(format!(
                    "place '{}' ({}) is required by a transition but is never marked",
                    place.name, place_id
                ));
            }
        }

        for (transition_id, transition) in self.transitions.iter_enumerated() {
            if transition.arcs.is_empty() {
                isolated_transitions.push((transition_id, transition.name.clone()));
            }
        }

        DiagnosticReport {
            isolated_places,
            isolated_transitions,
            warnings,
            total_places: self.places_len(),
            total_transitions: self.transitions_len(),
        }
    }

    pub fn log_diagnostics(&self) {
        let report = self.diagnose();

        if !report.has_issues() {
            log::info!(
                "net ok: {} places, {} transitions, {} buses",
                report.total_places,
                report.total_transitions,
                self.buses.len()
            );
            return;
        }

        for (id, name) in &report.isolated_places {
            log::warn!("isolated place {} '{}'", id, name);
        }
        for (id, name) in &report.isolated_transitions {
            log::warn!("isolated transition {} '{}'", id, name);
        }
        for warning in &report.warnings {
            log::warn!("{}", warning);
        }
    }
}

impl Default for Net {
    fn default() -> Self {
        Self::empty()
    }
}

fn escape_label(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '{' | '}' | '|' | '<' | '>' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
