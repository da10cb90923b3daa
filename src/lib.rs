//! pneu: 条件/事件 Petri 网的随机执行器.
//!
//! 文本记法经 [`lang`] 解析为语句, 由 [`net::NetBuilder`] 组装成不可变的 [`net::Net`];
//! [`sim`] 在其上按总线语义推进标识, 单次运行或以 rayon 并行批量运行;
//! [`report`] 负责审计日志、轨迹文档与统计汇总的导出.
#![warn(non_snake_case)]

pub mod config;
pub mod lang;
pub mod net;
pub mod options;
pub mod report;
pub mod sim;
