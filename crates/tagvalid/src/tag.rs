//! Rule-string parser.
//!
//! Grammar of a `valid` tag:
//!
//! ```text
//! tag          := match-clause? (rule ";")* rule?
//! match-clause := "Match(/" regex-body "/)"
//! rule         := identifier ("(" arg ("," arg)* ")")?
//! ```
//!
//! The match clause is cut out first because its body may contain `;`, `,`
//! and `)`. It starts at the first `Match(/` and ends at the last `/)`.

use crate::error::{Result, ValidationError};
use crate::registry::{Argument, ParamKind, Registry};
use crate::value::Field;
use regex::Regex;

const MATCH_OPEN: &str = "Match(/";
const MATCH_CLOSE: &str = "/)";

/// One resolved rule invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCall {
    pub name: String,
    pub args: Vec<Argument>,
    /// Key failures are reported under
    pub key: String,
}

/// Key a field's failures are reported under.
///
/// The field name, unless the JSON tag names the field or an alias is set.
pub fn resolve_key(field: &Field<'_>) -> String {
    let alias = field.tags.alias.trim();
    if !alias.is_empty() {
        return alias.to_string();
    }
    let json_name = field.tags.json.split(',').next().unwrap_or_default().trim();
    if !json_name.is_empty() {
        return json_name.to_string();
    }
    field.name.to_string()
}

/// Parse the rule string of `field`.
pub fn parse_field(registry: &Registry, field: &Field<'_>) -> Result<Vec<RuleCall>> {
    if field.tags.valid.trim().is_empty() {
        return Ok(Vec::new());
    }
    parse(registry, field.tags.valid, &resolve_key(field))
}

/// Parse `tag` into rule invocations reporting under `key`.
///
/// ```rust,ignore
/// let calls = tagvalid::tag::parse(&Registry::new(), "Required;Range(1,140)", "age")?;
/// assert_eq!(calls[1].name, "Range");
/// ```
pub fn parse(registry: &Registry, tag: &str, key: &str) -> Result<Vec<RuleCall>> {
    let tag = tag.trim();
    let mut calls = Vec::new();

    let rest = match tag.find(MATCH_OPEN) {
        None => tag.to_string(),
        Some(start) => {
            let body_start = start + MATCH_OPEN.len();
            let end = match tag.rfind(MATCH_CLOSE) {
                Some(end) if end >= body_start => end,
                _ => return Err(ValidationError::InvalidMatchClause(tag.to_string())),
            };
            calls.push(match_call(registry, &tag[body_start..end], key)?);
            format!("{};{}", &tag[..start], &tag[end + MATCH_CLOSE.len()..])
        }
    };

    for segment in rest.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        calls.push(parse_segment(registry, segment, key)?);
    }
    Ok(calls)
}

fn match_call(registry: &Registry, body: &str, key: &str) -> Result<RuleCall> {
    let kinds = registry.param_kinds("Match")?;
    if kinds.len() != 1 {
        return Err(ValidationError::arity("Match", kinds.len(), 1));
    }
    Ok(RuleCall {
        name: "Match".to_string(),
        args: vec![coerce("Match", 0, kinds[0], body)?],
        key: format!("{key}.Match"),
    })
}

fn parse_segment(registry: &Registry, segment: &str, key: &str) -> Result<RuleCall> {
    let Some(open) = segment.find('(') else {
        let arity = registry.arity(segment)?;
        if arity != 0 {
            return Err(ValidationError::arity(segment, arity, 0));
        }
        return Ok(RuleCall {
            name: segment.to_string(),
            args: Vec::new(),
            key: key.to_string(),
        });
    };

    let close = segment[open..]
        .find(')')
        .map(|offset| open + offset)
        .ok_or_else(|| ValidationError::InvalidSyntax(segment.to_string()))?;
    if !segment[close + 1..].trim().is_empty() {
        return Err(ValidationError::InvalidSyntax(segment.to_string()));
    }
    let name = segment[..open].trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidSyntax(segment.to_string()));
    }

    let kinds = registry.param_kinds(name)?;
    let raw: Vec<&str> = segment[open + 1..close].split(',').map(str::trim).collect();
    if raw.len() != kinds.len() {
        return Err(ValidationError::arity(name, kinds.len(), raw.len()));
    }

    let args = raw
        .iter()
        .zip(&kinds)
        .enumerate()
        .map(|(index, (raw, kind))| coerce(name, index, *kind, raw))
        .collect::<Result<Vec<_>>>()?;

    Ok(RuleCall {
        name: name.to_string(),
        args,
        key: key.to_string(),
    })
}

fn coerce(rule: &str, index: usize, kind: ParamKind, raw: &str) -> Result<Argument> {
    match kind {
        ParamKind::Int => raw
            .parse::<i64>()
            .map(Argument::Int)
            .map_err(|e| ValidationError::parameter(rule, index, format!("{raw:?}: {e}"))),
        ParamKind::Str => Ok(Argument::Str(raw.to_string())),
        ParamKind::Regex => Regex::new(raw)
            .map(Argument::Regex)
            .map_err(|e| ValidationError::parameter(rule, index, e.to_string())),
        ParamKind::List => Err(ValidationError::parameter(
            rule,
            index,
            "list parameters cannot be written in a tag",
        )),
    }
}
