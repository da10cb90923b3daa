//! # 条件/事件网（Condition/Event Net）核心定义
//!
//! 设库所集合 `P`、迁移实例集合 `T`，标识 `M : P → {0, 1}`。
//! 每条弧属于四种类型之一：Consume、Produce、Catalyst、Inhibit。
//! 对迁移实例 `t`：
//!
//! * `t` **局部可激发** 当且仅当：
//!   1. 所有 Consume 与 Catalyst 库所 `p` 满足 `M[p] = 1`；
//!   2. 所有 Inhibit 库所 `p` 满足 `M[p] = 0`；
//!   3. 若 `t` 为源迁移（无 Consume 且无 Catalyst），本次运行中尚未发生过。
//! * `t` **发生** 后：Consume 库所置 0，Produce 库所置 1，其余不变。
//!
//! 标签相同的迁移实例组成一条 **总线**，一起发生；见 [`crate::sim`]。
//!
//! ## 示例
//!
//! ```rust
//! use pneu::net::*;
//!
//! let statements = vec![
//!     Statement::clause("t", [(ArcKind::Consume, "a"), (ArcKind::Produce, "out")]),
//!     Statement::factual(["a"]),
//! ];
//! let (net, errors) = build_net(&statements);
//! assert!(errors.is_empty());
//!
//! let marking = Marking::initial(&net);
//! let a = net.place_by_name("a").unwrap();
//! assert!(marking.is_marked(a));
//! assert_eq!(net.bus("t").len(), 1);
//! ```

pub mod builder;
pub mod core;
pub mod ids;
pub mod index_vec;
pub mod io;
pub mod structure;

pub use builder::{BuildError, BuildErrorKind, NetBuilder, Statement, build_net};
pub use core::{DiagnosticReport, Net, NetError};
pub use ids::{ArcId, PlaceId, TransitionId};
pub use index_vec::{Idx, IndexVec};
pub use structure::{Arc, ArcKind, Marking, MarkingSnapshot, Place, Transition};
