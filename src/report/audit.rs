//! 批量运行的审计日志 (CSV).
//!
//! 每次运行的每一步中, 每条发生的总线写一行 `run_id,step,event_type`.
//! `run_id` 为运行序号 (从 0 开始), `step` 为引擎步号 (从 1 开始),
//! 同一步中的多条总线共享同一个步号.
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::net::io::{IoError, create};
use crate::sim::Trace;

pub const AUDIT_HEADER: &str = "run_id,step,event_type";

fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// 返回写出的事件行数 (不含表头).
pub fn write_audit<W: Write>(mut writer: W, traces: &[Trace]) -> io::Result<usize> {
    writeln!(writer, "{}", AUDIT_HEADER)?;
    let mut rows = 0;
    for (run_id, trace) in traces.iter().enumerate() {
        for record in &trace.steps {
            for label in &record.fired_labels {
                writeln!(writer, "{},{},{}", run_id, record.step, field(label))?;
                rows += 1;
            }
        }
    }
    writer.flush()?;
    Ok(rows)
}

pub fn write_audit_csv<P: AsRef<Path>>(path: P, traces: &[Trace]) -> Result<usize, IoError> {
    let path = path.as_ref();
    let rows = write_audit(BufWriter::new(create(path)?), traces)?;
    log::info!("wrote {} audit rows to {}", rows, path.display());
    Ok(rows)
}
