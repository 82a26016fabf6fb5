//! Column projection and row filtering.
//!
//! Projection only decides which columns the text table shows. It never
//! touches the records themselves, so sorting and JSON output are unaffected.
//!
//! Row filters are a conjunction of conditions written as `column:<expr>`:
//!
//! | Expression  | Meaning                         |
//! |-------------|---------------------------------|
//! | `value`     | equal to `value`                |
//! | `!value`    | not equal to `value`            |
//! | `>v` `>=v`  | greater (or equal) than `v`     |
//! | `<v` `<=v`  | less (or equal) than `v`        |
//! | `~regex`    | display value matches `regex`   |
//!
//! Operands are trimmed, parsed according to the column's value kind and
//! compared against raw values. Regular expressions match the formatted cell,
//! or the raw value when the column's formatter fails.

use std::cmp::Ordering;

use regex::Regex;

use crate::columns::{Column, Schema, Value, ValueKind};
use crate::error::ConfigError;

/// The ordered set of columns a text render shows.
pub struct Projection<'a, T> {
    columns: Vec<&'a Column<T>>,
}

impl<'a, T> Projection<'a, T> {
    /// Every visible column, header group first, otherwise in declaration order.
    pub fn default_for(schema: &'a Schema<T>) -> Self {
        Projection {
            columns: schema.grouped().filter(|c| c.is_visible()).collect(),
        }
    }

    /// The named columns in schema order, header group first. No names
    /// selects the default projection.
    pub fn select<S: AsRef<str>>(schema: &'a Schema<T>, names: &[S]) -> Result<Self, ConfigError> {
        if is_blank(names) {
            return Ok(Self::default_for(schema));
        }
        let mut positions = resolve_positions(schema, names)?;
        positions.sort_by_key(|&i| (schema.columns()[i].group(), i));
        Ok(Projection {
            columns: positions.into_iter().map(|i| &schema.columns()[i]).collect(),
        })
    }

    /// The named columns in the order given. No names selects the default
    /// projection.
    pub fn ordered<S: AsRef<str>>(schema: &'a Schema<T>, names: &[S]) -> Result<Self, ConfigError> {
        if is_blank(names) {
            return Ok(Self::default_for(schema));
        }
        let positions = resolve_positions(schema, names)?;
        Ok(Projection {
            columns: positions.into_iter().map(|i| &schema.columns()[i]).collect(),
        })
    }

    pub fn columns(&self) -> &[&'a Column<T>] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }
}

impl<T> Clone for Projection<'_, T> {
    fn clone(&self) -> Self {
        Projection {
            columns: self.columns.clone(),
        }
    }
}

fn is_blank<S: AsRef<str>>(names: &[S]) -> bool {
    names.iter().all(|n| n.as_ref().trim().is_empty())
}

fn resolve_positions<T, S: AsRef<str>>(
    schema: &Schema<T>,
    names: &[S],
) -> Result<Vec<usize>, ConfigError> {
    let mut positions = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        let pos = schema
            .position(name)
            .ok_or_else(|| ConfigError::UnknownColumn {
                name: name.to_string(),
                valid: schema.names(),
            })?;
        if !positions.contains(&pos) {
            positions.push(pos);
        }
    }
    Ok(positions)
}

#[derive(Debug, Clone)]
pub enum Op {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Ge(Value),
    Lt(Value),
    Le(Value),
    Matches(Regex),
}

/// One test against one column.
pub struct Condition<'a, T> {
    column: &'a Column<T>,
    op: Op,
}

impl<'a, T> Condition<'a, T> {
    pub fn new(column: &'a Column<T>, op: Op) -> Self {
        Condition { column, op }
    }

    pub fn matches(&self, record: &T) -> bool {
        let value = self.column.raw(record);
        match &self.op {
            Op::Eq(operand) => value.compare(operand) == Ordering::Equal,
            Op::Ne(operand) => value.compare(operand) != Ordering::Equal,
            Op::Gt(operand) => value.compare(operand) == Ordering::Greater,
            Op::Ge(operand) => value.compare(operand) != Ordering::Less,
            Op::Lt(operand) => value.compare(operand) == Ordering::Less,
            Op::Le(operand) => value.compare(operand) != Ordering::Greater,
            Op::Matches(re) => match self.column.format(record) {
                Ok(text) => re.is_match(&text),
                Err(_) => re.is_match(&value.to_string()),
            },
        }
    }
}

/// Conjunction of conditions. An empty filter matches everything.
pub struct RowFilter<'a, T> {
    conditions: Vec<Condition<'a, T>>,
}

impl<'a, T> RowFilter<'a, T> {
    pub fn none() -> Self {
        RowFilter {
            conditions: Vec::new(),
        }
    }

    pub fn with(mut self, condition: Condition<'a, T>) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn matches(&self, record: &T) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }

    /// Parse `column:<expr>` filters. All of them must hold for a row to pass.
    pub fn parse<S: AsRef<str>>(filters: &[S], schema: &'a Schema<T>) -> Result<Self, ConfigError> {
        let mut conditions = Vec::with_capacity(filters.len());
        for filter in filters {
            let filter = filter.as_ref().trim();
            if filter.is_empty() {
                continue;
            }
            conditions.push(parse_condition(filter, schema)?);
        }
        Ok(RowFilter { conditions })
    }
}

fn parse_condition<'a, T>(filter: &str, schema: &'a Schema<T>) -> Result<Condition<'a, T>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidFilter {
        filter: filter.to_string(),
        reason,
    };

    let (name, expr) = filter
        .split_once(':')
        .ok_or_else(|| invalid("expected <column>:<value>".to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("missing column name".to_string()));
    }

    let column = schema
        .column(name)
        .ok_or_else(|| ConfigError::UnknownFilterColumn {
            name: name.to_string(),
            valid: schema.names(),
        })?;

    let kind = column.kind();
    let operand = |text: &str| parse_operand(kind, text).map_err(&invalid);

    let op = if let Some(pattern) = expr.strip_prefix('~') {
        Op::Matches(Regex::new(pattern).map_err(|e| invalid(e.to_string()))?)
    } else if let Some(rest) = expr.strip_prefix('!') {
        Op::Ne(operand(rest)?)
    } else if let Some(rest) = expr.strip_prefix(">=") {
        Op::Ge(operand(rest)?)
    } else if let Some(rest) = expr.strip_prefix('>') {
        Op::Gt(operand(rest)?)
    } else if let Some(rest) = expr.strip_prefix("<=") {
        Op::Le(operand(rest)?)
    } else if let Some(rest) = expr.strip_prefix('<') {
        Op::Lt(operand(rest)?)
    } else {
        Op::Eq(operand(expr)?)
    };

    Ok(Condition::new(column, op))
}

fn parse_operand(kind: ValueKind, text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    let not_a = |what: &str| format!("'{text}' is not a valid {what}");
    match kind {
        ValueKind::Unsigned => trimmed
            .parse()
            .map(Value::Unsigned)
            .map_err(|_| not_a("unsigned integer")),
        ValueKind::Signed => trimmed
            .parse()
            .map(Value::Signed)
            .map_err(|_| not_a("signed integer")),
        ValueKind::Float => trimmed
            .parse()
            .map(Value::Float)
            .map_err(|_| not_a("number")),
        ValueKind::Byte => match trimmed.as_bytes() {
            [b] if !b.is_ascii_digit() => Ok(Value::Byte(*b)),
            _ => trimmed
                .parse()
                .map(Value::Byte)
                .map_err(|_| not_a("byte")),
        },
        ValueKind::String => Ok(Value::Str(trimmed.to_string())),
        ValueKind::Bytes => Err("byte buffers cannot be filtered".to_string()),
    }
}

/// Keep the records that pass the filter, in their original order.
pub fn filter_rows<T>(batch: Vec<T>, filter: &RowFilter<'_, T>) -> Vec<T> {
    if filter.is_empty() {
        return batch;
    }
    batch.into_iter().filter(|r| filter.matches(r)).collect()
}
