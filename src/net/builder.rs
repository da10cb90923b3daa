//! 语句 -> 网 的构造器。
//!
//! 库所遵循唯一名假设（UNA）：同一标签在一次构造中总是解析到同一个
//! `PlaceId`；迁移则不然，每个子句都会新建一个迁移实例，即便标签重复，
//! 重复标签的实例构成同一条总线。
//!
//! 构造过程从不中断：结构错误被累积到 [`BuildError`] 列表中，
//! 调用方拿到尽力构造出的网后自行决定是否放弃。
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::core::Net;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::{ArcKind, Place, Transition};

/// 已解析的语句。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// `a, b.`：初始标识中为真的库所。
    Factual { places: Vec<String> },
    /// 一个迁移子句及其全部弧。
    Clause {
        transition: String,
        arcs: Vec<(ArcKind, String)>,
    },
}

impl Statement {
    pub fn factual<I, S>(places: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Statement::Factual {
            places: places.into_iter().map(Into::into).collect(),
        }
    }

    pub fn clause<S, I, P>(transition: S, arcs: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (ArcKind, P)>,
        P: Into<String>,
    {
        Statement::Clause {
            transition: transition.into(),
            arcs: arcs
                .into_iter()
                .map(|(kind, place)| (kind, place.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildErrorKind {
    #[error("clause declares arcs but names no transition")]
    MissingTransition,
    #[error("empty place label")]
    EmptyLabel,
    #[error("statement declares no places")]
    EmptyStatement,
    #[error("place '{place}' declared as {kind} conflicts with an earlier {previous} arc on '{transition}'")]
    ConflictingArcs {
        place: String,
        transition: String,
        kind: ArcKind,
        previous: ArcKind,
    },
}

/// 结构诊断：错误类型 + 触发它的语句序号（若可定位）。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}{kind}", location(.index))]
pub struct BuildError {
    pub index: Option<usize>,
    pub kind: BuildErrorKind,
}

fn location(index: &Option<usize>) -> String {
    index
        .map(|index| format!("statement {}: ", index + 1))
        .unwrap_or_default()
}

/// 单次构造期间持有的库所注册表。
#[derive(Debug, Default)]
pub struct NetBuilder {
    net: Net,
    registry: IndexMap<String, PlaceId>,
    errors: Vec<BuildError>,
}

impl NetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// UNA：首次出现创建库所，之后复用。
    pub fn place(&mut self, label: &str) -> PlaceId {
        if let Some(id) = self.registry.get(label) {
            return *id;
        }
        let id = self.net.add_place(Place::new(label));
        self.registry.insert(label.to_string(), id);
        id
    }

    pub fn push(&mut self, index: usize, statement: &Statement) {
        match statement {
            Statement::Factual { places } => self.push_factual(index, places),
            Statement::Clause { transition, arcs } => self.push_clause(index, transition, arcs),
        }
    }

    fn push_factual(&mut self, index: usize, places: &[String]) {
        if places.is_empty() {
            self.error(index, BuildErrorKind::EmptyStatement);
            return;
        }
        for label in places {
            let Some(label) = self.label(index, label) else {
                continue;
            };
            let id = self.place(&label);
            self.net.places[id].factual = true;
        }
    }

    fn push_clause(&mut self, index: usize, transition: &str, arcs: &[(ArcKind, String)]) {
        let transition = transition.trim();
        if transition.is_empty() {
            // 仍然登记库所，使后续语句看到一致的注册表
            for (_, label) in arcs {
                if let Some(label) = self.label(index, label) {
                    self.place(&label);
                }
            }
            self.error(index, BuildErrorKind::MissingTransition);
            return;
        }

        let id = self.net.add_transition(Transition::new(transition));
        log::debug!("statement {}: new instance {} of bus '{}'", index + 1, id, transition);

        for (kind, label) in arcs {
            let Some(label) = self.label(index, label) else {
                continue;
            };
            let place = self.place(&label);
            if let Some(previous) = self.conflicting_kind(place, id, *kind) {
                self.error(
                    index,
                    BuildErrorKind::ConflictingArcs {
                        place: label,
                        transition: transition.to_string(),
                        kind: *kind,
                        previous,
                    },
                );
                continue;
            }
            if let Err(err) = self.net.add_arc(place, id, *kind) {
                // 注册表中的 id 总是有效的；若出现说明内部状态损坏
                log::error!("statement {}: {}", index + 1, err);
            }
        }
    }

    /// 同一子句内互相矛盾的声明：必需输入与抑制，或 Consume 与 Catalyst 并存。
    fn conflicting_kind(
        &self,
        place: PlaceId,
        transition: TransitionId,
        kind: ArcKind,
    ) -> Option<ArcKind> {
        self.net
            .arcs_of(transition)
            .filter(|arc| arc.place == place && arc.kind != kind)
            .map(|arc| arc.kind)
            .find(|previous| match (*previous, kind) {
                (ArcKind::Produce, _) | (_, ArcKind::Produce) => false,
                _ => true,
            })
    }

    fn label(&mut self, index: usize, label: &str) -> Option<String> {
        let label = label.trim();
        if label.is_empty() {
            self.error(index, BuildErrorKind::EmptyLabel);
            None
        } else {
            Some(label.to_string())
        }
    }

    fn error(&mut self, index: usize, kind: BuildErrorKind) {
        log::debug!("statement {}: {}", index + 1, kind);
        self.errors.push(BuildError {
            index: Some(index),
            kind,
        });
    }

    pub fn finish(self) -> (Net, Vec<BuildError>) {
        log::debug!(
            "built net: {} unique places, {} transitions, {} arcs, {} errors",
            self.registry.len(),
            self.net.transitions_len(),
            self.net.arcs_len(),
            self.errors.len()
        );
        (self.net, self.errors)
    }
}

/// 由完整语句序列构造网，返回网与累积的结构错误。
pub fn build_net<'a, I>(statements: I) -> (Net, Vec<BuildError>)
where
    I: IntoIterator<Item = &'a Statement>,
{
    let mut builder = NetBuilder::new();
    for (index, statement) in statements.into_iter().enumerate() {
        builder.push(index, statement);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn places_follow_unique_name_assumption() {
        let statements = vec![
            Statement::clause("t1", [(ArcKind::Consume, "a"), (ArcKind::Produce, "d")]),
            Statement::clause("t2", [(ArcKind::Consume, "e"), (ArcKind::Produce, "a")]),
        ];
        let (net, errors) = build_net(&statements);

        assert!(errors.is_empty());
        assert_eq!(net.places_len(), 3);
        let a = net.place_by_name("a").unwrap();
        let t1 = TransitionId::new(0);
        let t2 = TransitionId::new(1);
        assert!(net.places_of(t1, ArcKind::Consume).any(|p| p == a));
        assert!(net.places_of(t2, ArcKind::Produce).any(|p| p == a));
    }

    #[test]
    fn repeated_transition_labels_create_distinct_instances() {
        let statements = vec![
            Statement::clause("t", [(ArcKind::Consume, "a")]),
            Statement::clause("t", [(ArcKind::Consume, "b")]),
        ];
        let (net, errors) = build_net(&statements);

        assert!(errors.is_empty());
        assert_eq!(net.transitions_len(), 2);
        assert_eq!(net.bus("t").len(), 2);
        assert_eq!(net.buses.len(), 1);
    }

    #[test]
    fn basic_statement_counts() {
        // a, b : c -> d -o #t1 -> e.
        let statements = vec![Statement::clause(
            "t1",
            [
                (ArcKind::Consume, "a"),
                (ArcKind::Consume, "b"),
                (ArcKind::Catalyst, "c"),
                (ArcKind::Inhibit, "d"),
                (ArcKind::Produce, "e"),
            ],
        )];
        let (net, errors) = build_net(&statements);

        assert!(errors.is_empty());
        assert_eq!(net.places_len(), 5);
        assert_eq!(net.transitions_len(), 1);
        assert_eq!(net.arcs_len(), 5);
    }

    #[test]
    fn factual_statements_mark_places() {
        let statements = vec![
            Statement::factual(["b", "c"]),
            Statement::factual(["b"]),
            Statement::clause("t", [(ArcKind::Consume, "x")]),
        ];
        let (net, errors) = build_net(&statements);

        assert!(errors.is_empty());
        assert_eq!(net.places_len(), 3);
        let factual = net
            .factual_places()
            .map(|p| net.places[p].name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(factual, vec!["b", "c"]);
    }

    #[test]
    fn duplicate_arcs_are_idempotent() {
        let statements = vec![Statement::clause(
            "t",
            [
                (ArcKind::Produce, "b"),
                (ArcKind::Produce, "b"),
                (ArcKind::Consume, "a"),
            ],
        )];
        let (net, errors) = build_net(&statements);

        assert!(errors.is_empty());
        assert_eq!(net.arcs_len(), 2);
    }

    #[test]
    fn clause_without_transition_is_reported() {
        let statements = vec![
            Statement::clause("  ", [(ArcKind::Consume, "a")]),
            Statement::clause("t", [(ArcKind::Consume, "a")]),
        ];
        let (net, errors) = build_net(&statements);

        assert_eq!(
            errors,
            vec![BuildError {
                index: Some(0),
                kind: BuildErrorKind::MissingTransition,
            }]
        );
        assert_eq!(net.transitions_len(), 1);
        assert_eq!(net.places_len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "statement 1: clause declares arcs but names no transition"
        );
        let unplaced = BuildError {
            index: None,
            kind: BuildErrorKind::EmptyLabel,
        };
        assert_eq!(unplaced.to_string(), "empty place label");
    }

    #[test]
    fn conflicting_declarations_keep_the_first_arc() {
        let statements = vec![Statement::clause(
            "t",
            [
                (ArcKind::Consume, "a"),
                (ArcKind::Inhibit, "a"),
                (ArcKind::Produce, "a"),
            ],
        )];
        let (net, errors) = build_net(&statements);

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0].kind,
            BuildErrorKind::ConflictingArcs {
                kind: ArcKind::Inhibit,
                previous: ArcKind::Consume,
                ..
            }
        ));
        // consume + produce on the same place is a legal self-loop
        assert_eq!(net.arcs_len(), 2);
    }

    #[test]
    fn empty_labels_and_statements_are_reported() {
        let statements = vec![
            Statement::factual(Vec::<String>::new()),
            Statement::factual([""]),
            Statement::clause("t", [(ArcKind::Produce, " ")]),
        ];
        let (net, errors) = build_net(&statements);

        let kinds = errors.iter().map(|e| e.kind.clone()).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                BuildErrorKind::EmptyStatement,
                BuildErrorKind::EmptyLabel,
                BuildErrorKind::EmptyLabel,
            ]
        );
        assert_eq!(net.places_len(), 0);
        assert_eq!(net.transitions_len(), 1);
        assert_eq!(errors[2].index, Some(2));
    }
}
