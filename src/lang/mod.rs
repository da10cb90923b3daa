//! 网的文本记法.
//!
//! 读取 `.pn` 源文本, 产出 [`Statement`] 序列并交给 [`NetBuilder`] 组装.
//! 语法错误与构建错误都会被收集, 不会中断整个文件的处理.
pub mod parser;

use std::fmt;
use std::path::Path;

use anyhow::Context;

use crate::net::{BuildError, Net, NetBuilder, Statement};

pub use parser::{ParseError, Parsed, parse_str};

/// 源文件中的一条问题, 已定位到行.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Parse(ParseError),
    Build { line: Option<usize>, error: BuildError },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Parse(error) => write!(f, "syntax error at {error}"),
            Diagnostic::Build {
                line: Some(line),
                error,
            } => write!(f, "line {}: {}", line, error.kind),
            Diagnostic::Build { line: None, error } => write!(f, "{error}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compiled {
    pub net: Net,
    pub statements: Vec<Statement>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compiled {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// 解析并构建; 有问题的语句被跳过, 其余部分照常组装.
pub fn compile_str(src: &str) -> Compiled {
    let Parsed {
        statements,
        lines,
        errors,
    } = parse_str(src);

    let mut builder = NetBuilder::new();
    for (index, statement) in statements.iter().enumerate() {
        builder.push(index, statement);
    }
    let (net, build_errors) = builder.finish();

    let diagnostics = errors
        .into_iter()
        .map(Diagnostic::Parse)
        .chain(build_errors.into_iter().map(|error| Diagnostic::Build {
            line: error.index.and_then(|index| lines.get(index).copied()),
            error,
        }))
        .collect();

    Compiled {
        net,
        statements,
        diagnostics,
    }
}

pub fn compile_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Compiled> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read net source {}", path.display()))?;
    log::debug!("compiling {} ({} bytes)", path.display(), src.len());
    Ok(compile_str(&src))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ArcKind, BuildErrorKind};

    #[test]
    fn full_clause_builds_five_places_one_transition() {
        let compiled = compile_str("a, b : c -> d -o #t1 -> e.");
        assert!(compiled.is_clean(), "{:?}", compiled.diagnostics);
        let net = &compiled.net;
        assert_eq!(net.places_len(), 5);
        assert_eq!(net.transitions_len(), 1);
        assert_eq!(net.arcs_len(), 5);
    }

    #[test]
    fn places_follow_unique_names() {
        let compiled = compile_str("a -> #b. #b -> a.");
        assert!(compiled.is_clean());
        assert_eq!(compiled.net.places_len(), 1);
        assert_eq!(compiled.net.transitions_len(), 2);
    }

    #[test]
    fn fork_creates_two_transitions() {
        let compiled = compile_str("a -> #b, #c.");
        assert_eq!(compiled.net.places_len(), 1);
        assert_eq!(compiled.net.transitions_len(), 2);
    }

    #[test]
    fn repeated_transition_labels_form_a_bus() {
        let compiled = compile_str("#a -> c. #a -> b.");
        let net = &compiled.net;
        assert_eq!(net.transitions_len(), 2);
        assert_eq!(net.bus("a").len(), 2);
        assert_eq!(net.labels().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn factual_places_are_initially_marked() {
        let compiled = compile_str("a -> #t -> out.\na.");
        let marking = compiled.net.initial_marking();
        assert_eq!(marking.render(&compiled.net), "{a}");
    }

    #[test]
    fn diagnostics_carry_source_lines() {
        let src = "a.\nx, y -> #t -> z.\nx -> y.\nc : c -> #u.\n";
        let compiled = compile_str(src);

        assert_eq!(compiled.diagnostics.len(), 2);
        match &compiled.diagnostics[0] {
            Diagnostic::Parse(error) => assert_eq!(error.line, 3),
            other => panic!("unexpected {other:?}"),
        }
        match &compiled.diagnostics[1] {
            Diagnostic::Build { line, error } => {
                assert_eq!(*line, Some(4));
                assert!(matches!(
                    error.kind,
                    BuildErrorKind::ConflictingArcs {
                        kind: ArcKind::Catalyst,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(compiled.diagnostics[1].to_string().starts_with("line 4: "));
        // 出错语句之外的部分照常构建
        assert_eq!(compiled.net.transitions_len(), 2);
    }
}
