//! Column model shared by every gadget record type.
//!
//! A record type declares its fields once through [`FieldSet::describe`]. The
//! declaration is turned into an immutable [`Schema`] the first time the type
//! is registered, and every sort, filter and render pass afterwards works on
//! the resulting [`Column`] descriptors instead of the concrete type.
//!
//! # Value vs. formatted value
//!
//! Each column has two accessors:
//!
//! - [`Column::raw`] returns a kind-tagged [`Value`]. Sorting and filtering
//!   only ever look at raw values.
//! - [`Column::format`] returns the human readable string shown in the text
//!   table. Gadgets may install their own formatter (byte counts, enums, ...).

mod directive;
mod schema;

pub use directive::{Directive, DEFAULT_WIDTH};
pub use schema::{
    columns_of, register, FieldDef, FieldSet, Record, Registration, Schema, SchemaBuilder,
};

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::FormatError;

pub(crate) type ValueFn<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
pub(crate) type FormatFn<T> = Arc<dyn Fn(&T) -> Result<String, FormatError> + Send + Sync>;

/// The kind of a column's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unsigned,
    Signed,
    Float,
    String,
    Byte,
    /// Opaque byte buffers. Declarable, but rejected at registration since
    /// they have neither a display form nor an ordering.
    Bytes,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Unsigned => "unsigned",
            ValueKind::Signed => "signed",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Byte => "byte",
            ValueKind::Bytes => "bytes",
        }
    }

    /// Whether values of this kind can be shown in a table and sorted.
    pub fn is_supported(&self) -> bool {
        !matches!(self, ValueKind::Bytes)
    }

    fn rank(&self) -> u8 {
        match self {
            ValueKind::Unsigned => 0,
            ValueKind::Signed => 1,
            ValueKind::Float => 2,
            ValueKind::Byte => 3,
            ValueKind::String => 4,
            ValueKind::Bytes => 5,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw, comparable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Str(String),
    Byte(u8),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unsigned(_) => ValueKind::Unsigned,
            Value::Signed(_) => ValueKind::Signed,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::String,
            Value::Byte(_) => ValueKind::Byte,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    /// Ascending comparison. Numbers compare numerically, floats by total
    /// order, strings byte-wise. Values of different kinds never share a
    /// column, they are ordered by kind only to keep the ordering total.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Unsigned(a), Value::Unsigned(b)) => a.cmp(b),
            (Value::Signed(a), Value::Signed(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Byte(a), Value::Byte(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => self.kind().rank().cmp(&other.kind().rank()),
        }
    }

    /// True when the value equals the zero value of its kind.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Unsigned(v) => *v == 0,
            Value::Signed(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Str(s) => s.is_empty(),
            Value::Byte(b) => *b == 0,
            Value::Bytes(b) => b.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Signed(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:.2}"),
            Value::Str(s) => f.write_str(s),
            Value::Byte(b) if b.is_ascii_graphic() => write!(f, "{}", *b as char),
            Value::Byte(b) => write!(f, "{b}"),
            Value::Bytes(b) => write!(f, "{b:02x?}"),
        }
    }
}

/// Rust types that can back a column.
pub trait ColumnType {
    const KIND: ValueKind;

    fn to_value(&self) -> Value;
}

macro_rules! impl_column_type {
    ($kind:ident, $variant:ident as $target:ty: $($t:ty),+) => {
        $(
            impl ColumnType for $t {
                const KIND: ValueKind = ValueKind::$kind;

                fn to_value(&self) -> Value {
                    Value::$variant(*self as $target)
                }
            }
        )+
    };
}

impl_column_type!(Unsigned, Unsigned as u64: u16, u32, u64, usize);
impl_column_type!(Signed, Signed as i64: i8, i16, i32, i64, isize);
impl_column_type!(Float, Float as f64: f32, f64);

impl ColumnType for u8 {
    const KIND: ValueKind = ValueKind::Byte;

    fn to_value(&self) -> Value {
        Value::Byte(*self)
    }
}

impl ColumnType for String {
    const KIND: ValueKind = ValueKind::String;

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl ColumnType for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

/// Display width of a column in the text table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Grow to the widest header or value in the current batch.
    Auto,
    /// Exactly this many characters.
    Fixed(usize),
}

/// Where the ellipsis marker goes when a cell is truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ellipsis {
    /// Cut without a marker.
    None,
    /// Marker first, the tail of the value is kept.
    Start,
    /// Keep the head of the value, marker last.
    #[default]
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// Header columns come from the embedded common block shared by all gadgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Group {
    Header,
    Gadget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Descriptor of one displayable, sortable attribute of a record type.
pub struct Column<T> {
    pub(crate) name: String,
    pub(crate) json_name: String,
    pub(crate) kind: ValueKind,
    pub(crate) width: Width,
    pub(crate) ellipsis: Ellipsis,
    pub(crate) align: Align,
    pub(crate) visible: bool,
    pub(crate) group: Group,
    pub(crate) omit_empty: bool,
    pub(crate) value: ValueFn<T>,
    pub(crate) format: Option<FormatFn<T>>,
}

impl<T> Column<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn ellipsis(&self) -> Ellipsis {
        self.ellipsis
    }

    pub fn align(&self) -> Align {
        self.align
    }

    /// False for columns declared with `hide`. Only the text table honors it.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn omit_empty(&self) -> bool {
        self.omit_empty
    }

    pub fn raw(&self, record: &T) -> Value {
        (self.value)(record)
    }

    pub fn format(&self, record: &T) -> Result<String, FormatError> {
        match &self.format {
            Some(format) => format(record),
            None => Ok(self.raw(record).to_string()),
        }
    }

    pub fn compare(&self, a: &T, b: &T, direction: Direction) -> Ordering {
        let ord = self.raw(a).compare(&self.raw(b));
        match direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }
}

impl<T> PartialEq for Column<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.json_name == other.json_name
            && self.kind == other.kind
            && self.width == other.width
            && self.ellipsis == other.ellipsis
            && self.align == other.align
            && self.visible == other.visible
            && self.group == other.group
            && self.omit_empty == other.omit_empty
            && self.format.is_some() == other.format.is_some()
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("json_name", &self.json_name)
            .field("kind", &self.kind)
            .field("width", &self.width)
            .field("ellipsis", &self.ellipsis)
            .field("align", &self.align)
            .field("visible", &self.visible)
            .field("group", &self.group)
            .field("omit_empty", &self.omit_empty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_compare() {
        assert_eq!(Value::Unsigned(2).compare(&Value::Unsigned(10)), Ordering::Less);
        assert_eq!(Value::Signed(-3).compare(&Value::Signed(1)), Ordering::Less);
        assert_eq!(Value::Float(1.5).compare(&Value::Float(1.5)), Ordering::Equal);
    }

    #[test]
    fn test_string_compare_is_bytewise() {
        // "Z" (0x5a) sorts before "a" (0x61)
        assert_eq!(
            Value::Str("Z".into()).compare(&Value::Str("a".into())),
            Ordering::Less
        );
        assert_eq!(
            Value::Str("10".into()).compare(&Value::Str("9".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_zero_values() {
        assert!(Value::Unsigned(0).is_zero());
        assert!(Value::Str(String::new()).is_zero());
        assert!(Value::Byte(0).is_zero());
        assert!(!Value::Signed(-1).is_zero());
        assert!(!Value::Str("x".into()).is_zero());
    }

    #[test]
    fn test_default_display() {
        assert_eq!(Value::Byte(b'R').to_string(), "R");
        assert_eq!(Value::Byte(0).to_string(), "0");
        assert_eq!(Value::Float(0.5).to_string(), "0.50");
        assert_eq!(Value::Signed(-22).to_string(), "-22");
    }

    #[test]
    fn test_column_type_kinds() {
        assert_eq!(<u32 as ColumnType>::KIND, ValueKind::Unsigned);
        assert_eq!(<i32 as ColumnType>::KIND, ValueKind::Signed);
        assert_eq!(<u8 as ColumnType>::KIND, ValueKind::Byte);
        assert_eq!(<String as ColumnType>::KIND, ValueKind::String);
        assert!(!<Vec<u8> as ColumnType>::KIND.is_supported());
        assert_eq!(7u32.to_value(), Value::Unsigned(7));
    }
}
