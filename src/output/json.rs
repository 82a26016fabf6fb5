use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::columns::{Schema, Value};

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Unsigned(v) => serializer.serialize_u64(*v),
            Value::Signed(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Byte(b) => serializer.serialize_u8(*b),
            Value::Bytes(b) => b.serialize(serializer),
        }
    }
}

/// A record serialized as a JSON object keyed by external field names, in
/// schema order with the header group first.
pub struct JsonRecord<'a, T> {
    schema: &'a Schema<T>,
    record: &'a T,
}

impl<'a, T> JsonRecord<'a, T> {
    pub fn new(schema: &'a Schema<T>, record: &'a T) -> Self {
        JsonRecord { schema, record }
    }
}

impl<T> Serialize for JsonRecord<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for column in self.schema.grouped() {
            let value = column.raw(self.record);
            if column.omit_empty() && value.is_zero() {
                continue;
            }
            map.serialize_entry(column.json_name(), &value)?;
        }
        map.end()
    }
}

struct JsonBatch<'a, T> {
    schema: &'a Schema<T>,
    batch: &'a [T],
}

impl<T> Serialize for JsonBatch<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.batch.len()))?;
        for record in self.batch {
            seq.serialize_element(&JsonRecord::new(self.schema, record))?;
        }
        seq.end()
    }
}

/// One compact JSON object per line.
pub fn render_json<T>(schema: &Schema<T>, batch: &[T]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in batch {
        out.push_str(&serde_json::to_string(&JsonRecord::new(schema, record))?);
        out.push('\n');
    }
    Ok(out)
}

/// The whole batch as one indented JSON array.
pub fn render_json_pretty<T>(schema: &Schema<T>, batch: &[T]) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(&JsonBatch { schema, batch })?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{register, FieldSet, Record, SchemaBuilder};

    #[derive(Default)]
    struct Open {
        pid: u32,
        fd: i32,
        path: String,
        mntns: u64,
        flags: u8,
    }

    impl FieldSet for Open {
        fn describe(fields: &mut SchemaBuilder<Self>) {
            fields.field("pid", |o: &Open| &o.pid);
            fields.field("fd", |o: &Open| &o.fd).omit_empty();
            fields.field("path,width:8", |o: &Open| &o.path).json("fname");
            fields
                .field("mntns,hide", |o: &Open| &o.mntns)
                .json("mountnsid")
                .omit_empty();
            fields.field("flags", |o: &Open| &o.flags);
        }
    }

    impl Record for Open {
        crate::record_registration!(Open);
    }

    #[test]
    fn test_json_line_per_record() {
        let schema = register::<Open>().unwrap();
        let batch = vec![
            Open {
                pid: 7,
                fd: 3,
                path: "/a/very/long/path".to_string(),
                mntns: 4026531840,
                flags: 2,
            },
            Open {
                pid: 8,
                ..Default::default()
            },
        ];
        let out = render_json(schema, &batch).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            r#"{"pid":7,"fd":3,"fname":"/a/very/long/path","mountnsid":4026531840,"flags":2}"#
        );
        // fd and mountnsid are omitted when zero, pid and flags are not.
        assert_eq!(lines[1], r#"{"pid":8,"fname":"","flags":0}"#);
    }

    #[derive(Default)]
    struct Origin {
        node: String,
        container: String,
    }

    impl FieldSet for Origin {
        fn describe(fields: &mut SchemaBuilder<Self>) {
            fields.field("node,hide", |o: &Origin| &o.node).omit_empty();
            fields.field("container", |o: &Origin| &o.container);
        }
    }

    #[derive(Default)]
    struct Exit {
        pid: u32,
        code: i32,
        origin: Origin,
    }

    impl FieldSet for Exit {
        fn describe(fields: &mut SchemaBuilder<Self>) {
            fields.field("pid", |e: &Exit| &e.pid);
            fields.field("code", |e: &Exit| &e.code);
            fields.embed(|e: &Exit| &e.origin);
        }
    }

    impl Record for Exit {
        crate::record_registration!(Exit);
    }

    #[test]
    fn test_json_header_fields_first() {
        let schema = register::<Exit>().unwrap();
        let exit = Exit {
            pid: 1,
            code: 2,
            origin: Origin {
                node: "n1".to_string(),
                container: "c".to_string(),
            },
        };
        let out = render_json(schema, &[exit]).unwrap();
        assert_eq!(
            out,
            "{\"node\":\"n1\",\"container\":\"c\",\"pid\":1,\"code\":2}\n"
        );
    }

    #[test]
    fn test_json_pretty_is_array() {
        let schema = register::<Open>().unwrap();
        let batch = vec![Open::default(), Open::default()];
        let out = render_json_pretty(schema, &batch).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["pid"], 0);
    }
}
