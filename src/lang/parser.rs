//! 文本记法解析.
//!
//! ```text
//! program    := statement*
//! statement  := factual | clause
//! factual    := places '.'
//! clause     := prefix? transitions ('->' places)? '.'
//! prefix     := places? (':' places)? '->' (places '-o')?
//!             | places '-o'
//! places     := label (',' label)*
//! transitions:= '#' label (',' '#' label)*
//! ```
//!
//! `%` 到行尾为注释. 一个语句解析失败时记录错误, 跳到下一个 `.` 之后继续;
//! 若先遇到注释, 则从注释结束处继续, 注释里的 `.` 不算语句结束.
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, multispace1, not_line_ending};
use nom::combinator::{map, opt, value};
use nom::multi::{many0_count, separated_list1};
use nom::sequence::{pair, preceded, terminated};

use thiserror::Error;

use crate::net::{ArcKind, Statement};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// 解析结果: 语句、每个语句所在的源码行, 以及语法错误.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parsed {
    pub statements: Vec<Statement>,
    pub lines: Vec<usize>,
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Default)]
struct Prefix<'a> {
    consume: Vec<&'a str>,
    catalyst: Vec<&'a str>,
    inhibit: Vec<&'a str>,
}

fn is_label_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn comment(i: &str) -> IResult<&str, ()> {
    value((), pair(char('%'), not_line_ending))(i)
}

/// 空白与注释
fn sp(i: &str) -> IResult<&str, ()> {
    value((), many0_count(alt((value((), multispace1), comment))))(i)
}

fn token<'a>(t: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(sp, tag(t))
}

fn label(i: &str) -> IResult<&str, &str> {
    preceded(sp, take_while1(is_label_char))(i)
}

fn places(i: &str) -> IResult<&str, Vec<&str>> {
    separated_list1(token(","), label)(i)
}

fn transition(i: &str) -> IResult<&str, &str> {
    preceded(token("#"), take_while1(is_label_char))(i)
}

fn transitions(i: &str) -> IResult<&str, Vec<&str>> {
    separated_list1(token(","), transition)(i)
}

/// `a, b : c -> d -o`
fn enabling_prefix(i: &str) -> IResult<&str, Prefix<'_>> {
    let (i, consume) = opt(places)(i)?;
    let (i, catalyst) = opt(preceded(token(":"), places))(i)?;
    let (i, _) = token("->")(i)?;
    let (i, inhibit) = opt(terminated(places, token("-o")))(i)?;
    Ok((
        i,
        Prefix {
            consume: consume.unwrap_or_default(),
            catalyst: catalyst.unwrap_or_default(),
            inhibit: inhibit.unwrap_or_default(),
        },
    ))
}

/// `d -o`
fn inhibiting_prefix(i: &str) -> IResult<&str, Prefix<'_>> {
    map(terminated(places, token("-o")), |inhibit| Prefix {
        inhibit,
        ..Prefix::default()
    })(i)
}

fn clause(i: &str) -> IResult<&str, Vec<Statement>> {
    let (i, prefix) = opt(alt((enabling_prefix, inhibiting_prefix)))(i)?;
    let (i, labels) = transitions(i)?;
    let (i, outputs) = opt(preceded(token("->"), places))(i)?;
    let (i, _) = token(".")(i)?;

    let prefix = prefix.unwrap_or_default();
    let outputs = outputs.unwrap_or_default();
    let arcs = prefix
        .consume
        .iter()
        .map(|p| (ArcKind::Consume, *p))
        .chain(prefix.catalyst.iter().map(|p| (ArcKind::Catalyst, *p)))
        .chain(prefix.inhibit.iter().map(|p| (ArcKind::Inhibit, *p)))
        .chain(outputs.iter().map(|p| (ArcKind::Produce, *p)))
        .collect::<Vec<_>>();

    // `a -> #b, #c.` 展开为两个独立子句
    let statements = labels
        .into_iter()
        .map(|transition| Statement::clause(transition, arcs.iter().copied()))
        .collect();
    Ok((i, statements))
}

fn factual(i: &str) -> IResult<&str, Vec<Statement>> {
    map(terminated(places, token(".")), |places| {
        vec![Statement::factual(places)]
    })(i)
}

fn statement(i: &str) -> IResult<&str, Vec<Statement>> {
    alt((clause, factual))(i)
}

fn position(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|nl| before[nl + 1..].chars().count())
        .unwrap_or_else(|| before.chars().count())
        + 1;
    (line, column)
}

fn snippet(rest: &str) -> String {
    let end = rest.find(['.', '%', '\n']).unwrap_or(rest.len());
    let text = rest[..end].trim();
    if text.chars().count() > 40 {
        format!("{}...", text.chars().take(40).collect::<String>())
    } else {
        text.to_string()
    }
}

/// 出错语句之后的续读位置.
fn recover(rest: &str) -> &str {
    match rest.find(['.', '%']) {
        Some(at) if rest[at..].starts_with('%') => match comment(&rest[at..]) {
            Ok((after, ())) => after,
            Err(_) => "",
        },
        Some(dot) => &rest[dot + 1..],
        None => "",
    }
}

pub fn parse_str(src: &str) -> Parsed {
    let mut parsed = Parsed::default();
    let mut rest = src;

    loop {
        // sp 不会失败
        if let Ok((after, ())) = sp(rest) {
            rest = after;
        }
        if rest.is_empty() {
            break;
        }

        let offset = src.len() - rest.len();
        match statement(rest) {
            Ok((after, statements)) => {
                let (line, _) = position(src, offset);
                parsed.lines.extend(std::iter::repeat_n(line, statements.len()));
                parsed.statements.extend(statements);
                rest = after;
            }
            Err(_) => {
                let (line, column) = position(src, offset);
                let error = ParseError {
                    line,
                    column,
                    message: format!("unrecognised statement `{}`", snippet(rest)),
                };
                log::debug!("{}", error);
                parsed.errors.push(error);
                rest = recover(rest);
            }
        }
    }
    parsed
}
