//! Schema derivation and the per-type schema registry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use super::{Column, ColumnType, Directive, FormatFn, Group, ValueFn, ValueKind};
use crate::error::{FormatError, SchemaError};
use crate::sort;

/// Storage for a registered schema. Every [`Record`] owns exactly one, see
/// [`record_registration!`](crate::record_registration).
pub type Registration<T> = OnceCell<Schema<T>>;

/// A block of fields. Top-level records and embeddable header blocks both
/// implement it.
pub trait FieldSet: Sized + 'static {
    fn describe(fields: &mut SchemaBuilder<Self>);
}

/// A gadget record type that can be registered and rendered.
pub trait Record: FieldSet {
    /// Sort chain used when the user does not ask for one.
    const DEFAULT_SORT: &'static [&'static str] = &[];

    fn registration() -> &'static Registration<Self>;
}

/// Implements [`Record::registration`] with a dedicated static cell.
#[macro_export]
macro_rules! record_registration {
    ($ty:ty) => {
        fn registration() -> &'static $crate::columns::Registration<$ty> {
            static REGISTRATION: $crate::columns::Registration<$ty> =
                $crate::columns::Registration::new();
            &REGISTRATION
        }
    };
}

/// One declared field, before its directive has been validated.
pub struct FieldDef<T> {
    directive: String,
    json: Option<String>,
    omit_empty: bool,
    kind: ValueKind,
    group: Group,
    value: ValueFn<T>,
    format: Option<FormatFn<T>>,
}

impl<T: 'static> FieldDef<T> {
    /// External name used by the JSON output. Defaults to the column name.
    pub fn json(&mut self, name: &str) -> &mut Self {
        self.json = Some(name.to_string());
        self
    }

    /// Leave the field out of JSON output when it holds its zero value.
    pub fn omit_empty(&mut self) -> &mut Self {
        self.omit_empty = true;
        self
    }

    /// Humanize the value for the text table. Sorting still uses the raw value.
    pub fn format<F>(&mut self, format: F) -> &mut Self
    where
        F: Fn(&T) -> Result<String, FormatError> + Send + Sync + 'static,
    {
        self.format = Some(Arc::new(format));
        self
    }

    fn embedded<P: 'static>(self, project: fn(&P) -> &T) -> FieldDef<P> {
        let value = self.value;
        let value: ValueFn<P> = Arc::new(move |parent: &P| value(project(parent)));
        let format = self.format.map(|format| -> FormatFn<P> {
            Arc::new(move |parent: &P| format(project(parent)))
        });
        FieldDef {
            directive: self.directive,
            json: self.json,
            omit_empty: self.omit_empty,
            kind: self.kind,
            group: Group::Header,
            value,
            format,
        }
    }
}

/// Collects the field declarations of a record type.
pub struct SchemaBuilder<T> {
    fields: Vec<FieldDef<T>>,
}

impl<T: 'static> SchemaBuilder<T> {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare a field from its display directive and accessor.
    pub fn field<V, F>(&mut self, directive: &str, get: F) -> &mut FieldDef<T>
    where
        V: ColumnType,
        F: Fn(&T) -> &V + Send + Sync + 'static,
    {
        self.fields.push(FieldDef {
            directive: directive.to_string(),
            json: None,
            omit_empty: false,
            kind: V::KIND,
            group: Group::Gadget,
            value: Arc::new(move |record: &T| get(record).to_value()),
            format: None,
        });
        let last = self.fields.len() - 1;
        &mut self.fields[last]
    }

    /// Flatten the fields of an embedded block into this record. Embedded
    /// fields belong to the header group.
    pub fn embed<U: FieldSet>(&mut self, project: fn(&T) -> &U) {
        let mut inner = SchemaBuilder::<U>::new();
        U::describe(&mut inner);
        self.fields
            .extend(inner.fields.into_iter().map(|def| def.embedded(project)));
    }

    fn build(self, type_name: &'static str) -> Result<Vec<Column<T>>, SchemaError> {
        let mut columns = Vec::with_capacity(self.fields.len());
        let mut names = HashSet::new();
        let mut json_names = HashSet::new();

        for def in self.fields {
            let directive = Directive::parse(&def.directive).map_err(|reason| {
                SchemaError::MalformedDirective {
                    type_name,
                    directive: def.directive.clone(),
                    reason,
                }
            })?;

            if !def.kind.is_supported() {
                return Err(SchemaError::UnsupportedKind {
                    type_name,
                    column: directive.name,
                    kind: def.kind.as_str(),
                });
            }

            if !names.insert(directive.name.to_lowercase()) {
                return Err(SchemaError::DuplicateColumn {
                    type_name,
                    name: directive.name,
                });
            }

            let json_name = def.json.unwrap_or_else(|| directive.name.clone());
            if json_name.is_empty() {
                return Err(SchemaError::MalformedDirective {
                    type_name,
                    directive: def.directive,
                    reason: "empty JSON field name".to_string(),
                });
            }
            if !json_names.insert(json_name.clone()) {
                return Err(SchemaError::DuplicateJsonName {
                    type_name,
                    name: json_name,
                });
            }

            columns.push(Column {
                width: directive.width(),
                ellipsis: directive.ellipsis,
                align: directive.align,
                visible: !directive.hide,
                name: directive.name,
                json_name,
                kind: def.kind,
                group: def.group,
                omit_empty: def.omit_empty,
                value: def.value,
                format: def.format,
            });
        }

        Ok(columns)
    }
}

/// The ordered, immutable column set of one record type.
pub struct Schema<T> {
    type_name: &'static str,
    columns: Vec<Column<T>>,
    index: HashMap<String, usize>,
    grouped: Vec<usize>,
    default_sort: &'static [&'static str],
}

impl<T: Record> Schema<T> {
    /// Derive the schema of `T` without consulting the registry.
    pub fn derive() -> Result<Self, SchemaError> {
        let type_name = short_type_name::<T>();
        let mut builder = SchemaBuilder::new();
        T::describe(&mut builder);
        let columns = builder.build(type_name)?;

        let index = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name.to_lowercase(), i))
            .collect();

        let mut grouped: Vec<usize> = (0..columns.len()).collect();
        grouped.sort_by_key(|&i| (columns[i].group, i));

        let schema = Schema {
            type_name,
            columns,
            index,
            grouped,
            default_sort: T::DEFAULT_SORT,
        };

        sort::parse_sort(T::DEFAULT_SORT, &schema)
            .map_err(|source| SchemaError::InvalidDefaultSort { type_name, source })?;

        Ok(schema)
    }
}

impl<T> Schema<T> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Columns in declaration order, embedded header fields included.
    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    /// Columns header group first, otherwise in declaration order.
    pub fn grouped(&self) -> impl Iterator<Item = &Column<T>> + '_ {
        self.grouped.iter().map(|&i| &self.columns[i])
    }

    /// Case-insensitive lookup.
    pub fn column(&self, name: &str) -> Option<&Column<T>> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_lowercase()).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn default_sort(&self) -> &'static [&'static str] {
        self.default_sort
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<T> PartialEq for Schema<T> {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.columns == other.columns
            && self.default_sort == other.default_sort
    }
}

impl<T> std::fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("columns", &self.columns)
            .field("default_sort", &self.default_sort)
            .finish()
    }
}

/// Register `T`, deriving its schema on first use. Concurrent first calls are
/// serialized by the registration cell; later calls are plain reads.
pub fn register<T: Record>() -> Result<&'static Schema<T>, SchemaError> {
    T::registration().get_or_try_init(|| {
        let schema = Schema::<T>::derive()?;
        debug!(
            "Registered {} with columns: {}",
            schema.type_name,
            schema.names().join(", ")
        );
        Ok(schema)
    })
}

pub fn columns_of<T: Record>() -> Result<&'static [Column<T>], SchemaError> {
    Ok(register::<T>()?.columns())
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}
