//! Sort directive resolution and stable multi-key batch sorting.
//!
//! A sort directive is an ordered list of `[-|+]<column>` tokens. The first
//! token is the primary key, `-` sorts descending. Records that compare equal
//! on every key keep the order they had in the batch.

use std::cmp::Ordering;

use crate::columns::{Column, Direction, Schema, Value};
use crate::error::ConfigError;

pub struct SortKey<'a, T> {
    pub column: &'a Column<T>,
    pub direction: Direction,
}

impl<T> Clone for SortKey<'_, T> {
    fn clone(&self) -> Self {
        SortKey {
            column: self.column,
            direction: self.direction,
        }
    }
}

/// A resolved sort chain, leftmost key first.
pub struct SortSpec<'a, T> {
    keys: Vec<SortKey<'a, T>>,
}

impl<'a, T> SortSpec<'a, T> {
    /// A spec without keys. Sorting with it leaves the batch untouched.
    pub fn empty() -> Self {
        SortSpec { keys: Vec::new() }
    }

    pub fn keys(&self) -> &[SortKey<'a, T>] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The spec in directive form, e.g. `["-reads", "comm"]`.
    pub fn tokens(&self) -> Vec<String> {
        self.keys
            .iter()
            .map(|key| match key.direction {
                Direction::Ascending => key.column.name().to_string(),
                Direction::Descending => format!("-{}", key.column.name()),
            })
            .collect()
    }

    /// Compare two records along the whole chain.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        self.keys
            .iter()
            .map(|key| key.column.compare(a, b, key.direction))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn compare_values(&self, a: &[Value], b: &[Value]) -> Ordering {
        self.keys
            .iter()
            .zip(a.iter().zip(b))
            .map(|(key, (a, b))| match key.direction {
                Direction::Ascending => a.compare(b),
                Direction::Descending => a.compare(b).reverse(),
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl<T> Clone for SortSpec<'_, T> {
    fn clone(&self) -> Self {
        SortSpec {
            keys: self.keys.clone(),
        }
    }
}

impl<T> std::fmt::Debug for SortSpec<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tokens()).finish()
    }
}

/// Resolve sort tokens against a schema. Without tokens the schema's default
/// chain is used as declared.
pub fn parse_sort<'a, T, S: AsRef<str>>(
    tokens: &[S],
    schema: &'a Schema<T>,
) -> Result<SortSpec<'a, T>, ConfigError> {
    if tokens.iter().all(|t| t.as_ref().trim().is_empty()) {
        return resolve(schema.default_sort(), schema);
    }
    resolve(tokens, schema)
}

/// Resolve a comma separated sort directive such as `-reads,comm`.
pub fn parse_sort_list<'a, T>(
    directive: &str,
    schema: &'a Schema<T>,
) -> Result<SortSpec<'a, T>, ConfigError> {
    let tokens: Vec<&str> = directive.split(',').collect();
    parse_sort(&tokens, schema)
}

fn resolve<'a, T, S: AsRef<str>>(
    tokens: &[S],
    schema: &'a Schema<T>,
) -> Result<SortSpec<'a, T>, ConfigError> {
    let mut keys: Vec<SortKey<'a, T>> = Vec::with_capacity(tokens.len());

    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }

        let (direction, name) = if let Some(name) = token.strip_prefix('-') {
            (Direction::Descending, name)
        } else if let Some(name) = token.strip_prefix('+') {
            (Direction::Ascending, name)
        } else {
            (Direction::Ascending, token)
        };

        if name.is_empty() {
            return Err(ConfigError::EmptySortKey {
                token: token.to_string(),
            });
        }

        let column = schema
            .column(name)
            .ok_or_else(|| ConfigError::UnknownSortColumn {
                name: name.to_string(),
                valid: schema.names(),
            })?;

        // Leftmost occurrence decides the rank, later duplicates are ignored.
        if keys.iter().any(|key| std::ptr::eq(key.column, column)) {
            continue;
        }
        keys.push(SortKey { column, direction });
    }

    Ok(SortSpec { keys })
}

/// Stable multi-key sort. Raw key values are extracted once per record.
pub fn sort<T>(batch: &mut Vec<T>, spec: &SortSpec<'_, T>) {
    if spec.is_empty() || batch.len() < 2 {
        return;
    }

    let mut keyed: Vec<(Vec<Value>, T)> = batch
        .drain(..)
        .map(|record| {
            let values = spec.keys.iter().map(|key| key.column.raw(&record)).collect();
            (values, record)
        })
        .collect();

    // slice::sort_by is stable.
    keyed.sort_by(|(a, _), (b, _)| spec.compare_values(a, b));

    batch.extend(keyed.into_iter().map(|(_, record)| record));
}
