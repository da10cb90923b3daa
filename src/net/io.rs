//! I/O 支持：JSON 与 RON 序列化接口，供导出网结构与运行轨迹使用；
//! 另有面向其他 Petri 网工具的 PNML 导出。
use std::fmt::Write as FmtWrite;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::{ArcKind, Net};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron parse error: {0}")]
    RonSpanned(#[from] ron::error::SpannedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 写文件前确保父目录存在。
pub(crate) fn create<P: AsRef<Path>>(path: P) -> Result<File, IoError> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

pub fn to_json_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    let mut file = create(path)?;
    let content = to_json_string(value)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    from_json_str(&content)
}

pub fn to_ron_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    let mut pretty = PrettyConfig::default();
    pretty.new_line = "\n".into();
    Ok(ron::ser::to_string_pretty(value, pretty)?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s)?)
}

pub fn write_ron<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    let mut file = create(path)?;
    let content = to_ron_string(value)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

const PNML_NET_TYPE: &str = "http://www.pnml.org/version-2009/grammar/pnmlcoremodel";

/// PNML (核心模型) 文本。Produce 弧方向为迁移到库所；
/// Catalyst 与 Inhibit 弧以 `<type>` 标注，Consume 弧不标注。
pub fn to_pnml_string(net: &Net) -> String {
    let mut xml = String::new();
    let _ = writeln!(&mut xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    let _ = writeln!(&mut xml, "<pnml>");
    let _ = writeln!(&mut xml, "  <net id=\"net1\" type=\"{}\">", PNML_NET_TYPE);
    let _ = writeln!(&mut xml, "    <page id=\"page1\">");

    for (place_id, place) in net.places.iter_enumerated() {
        let _ = writeln!(&mut xml, "      <place id=\"{}\">", place_id);
        let _ = writeln!(&mut xml, "        <name><text>{}</text></name>", escape_xml(&place.name));
        let _ = writeln!(
            &mut xml,
            "        <initialMarking><text>{}</text></initialMarking>",
            u8::from(place.factual)
        );
        let _ = writeln!(&mut xml, "      </place>");
    }

    for (transition_id, transition) in net.transitions.iter_enumerated() {
        let _ = writeln!(&mut xml, "      <transition id=\"{}\">", transition_id);
        let _ = writeln!(
            &mut xml,
            "        <name><text>{}</text></name>",
            escape_xml(&transition.name)
        );
        let _ = writeln!(&mut xml, "      </transition>");
    }

    for (arc_id, arc) in net.arcs.iter_enumerated() {
        let (source, target) = match arc.kind {
            ArcKind::Produce => (arc.transition.to_string(), arc.place.to_string()),
            _ => (arc.place.to_string(), arc.transition.to_string()),
        };
        let _ = write!(
            &mut xml,
            "      <arc id=\"{}\" source=\"{}\" target=\"{}\"",
            arc_id, source, target
        );
        match arc.kind {
            ArcKind::Catalyst | ArcKind::Inhibit => {
                let _ = writeln!(&mut xml, ">");
                let _ = writeln!(&mut xml, "        <type><text>{}</text></type>", arc.kind);
                let _ = writeln!(&mut xml, "      </arc>");
            }
            ArcKind::Consume | ArcKind::Produce => {
                let _ = writeln!(&mut xml, "/>");
            }
        }
    }

    let _ = writeln!(&mut xml, "    </page>");
    let _ = writeln!(&mut xml, "  </net>");
    let _ = writeln!(&mut xml, "</pnml>");
    xml
}

pub fn write_pnml<P: AsRef<Path>>(path: P, net: &Net) -> Result<(), IoError> {
    let mut file = create(path)?;
    file.write_all(to_pnml_string(net).as_bytes())?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
