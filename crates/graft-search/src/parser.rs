//! Filter and order token parsing.
//!
//! This module only splits tokens into their parts. Whether the key exists
//! and whether the value converts is decided by the compilers.

/// How a filter token applies its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// `key:value`
    Include,
    /// `key!:value`
    Exclude,
    Undefined,
}

/// A filter token split into key, mode and raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterToken {
    pub token: String,
    pub key: String,
    pub mode: FilterMode,
    pub raw_value: String,
}

/// One comma separated part of a filter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueAtom {
    Literal(String),
    /// `from..to`, inclusive at both ends; a missing bound is open.
    Range {
        from: Option<String>,
        to: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderToken {
    pub token: String,
    pub key: String,
    pub direction: OrderDirection,
}

/// Split a filter token at its first `:`.
///
/// Tokens without a separator or with an empty key come back as
/// [`FilterMode::Undefined`].
pub fn parse_filter(token: &str) -> FilterToken {
    let undefined = || FilterToken {
        token: token.to_string(),
        key: token.trim().to_string(),
        mode: FilterMode::Undefined,
        raw_value: String::new(),
    };

    let Some((head, value)) = token.split_once(':') else {
        return undefined();
    };
    let head = head.trim();
    let (key, mode) = match head.strip_suffix('!') {
        Some(key) => (key.trim_end(), FilterMode::Exclude),
        None => (head, FilterMode::Include),
    };
    if key.is_empty() {
        return undefined();
    }

    FilterToken {
        token: token.to_string(),
        key: key.to_string(),
        mode,
        raw_value: value.trim().to_string(),
    }
}

/// Split a raw filter value into its atoms.
///
/// Returns a message describing the first malformed atom.
pub fn parse_value_atoms(raw: &str) -> Result<Vec<ValueAtom>, String> {
    if raw.trim().is_empty() {
        return Err("no value given".to_string());
    }
    raw.split(',').map(parse_atom).collect()
}

fn parse_atom(raw: &str) -> Result<ValueAtom, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty value in list".to_string());
    }
    let Some((from, to)) = raw.split_once("..") else {
        return Ok(ValueAtom::Literal(raw.to_string()));
    };
    let bound = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    let (from, to) = (bound(from), bound(to));
    if from.is_none() && to.is_none() {
        return Err(format!("range '{raw}' has no bounds"));
    }
    if to.as_deref().is_some_and(|t| t.contains("..")) {
        return Err(format!("range '{raw}' has more than two bounds"));
    }
    Ok(ValueAtom::Range { from, to })
}

/// Parse `key` or `key desc`.
pub fn parse_order(token: &str) -> OrderToken {
    let mut parts = token.split_whitespace();
    let key = parts.next().unwrap_or_default().to_string();
    let direction = match (key.is_empty(), parts.next(), parts.next()) {
        (false, None, _) => OrderDirection::Ascending,
        (false, Some(suffix), None) if suffix.eq_ignore_ascii_case("desc") => OrderDirection::Descending,
        _ => OrderDirection::Undefined,
    };
    OrderToken {
        token: token.to_string(),
        key,
        direction,
    }
}
