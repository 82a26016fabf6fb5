use serde::Deserialize;

use crate::columns::{FieldSet, SchemaBuilder};

/// Kubernetes placement of the process an event belongs to.
///
/// Only the container is shown in the table; node, namespace and pod are
/// carried in JSON output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommonData {
    pub node: String,
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl FieldSet for CommonData {
    fn describe(fields: &mut SchemaBuilder<Self>) {
        fields
            .field("node,hide", |c: &CommonData| &c.node)
            .omit_empty();
        fields
            .field("namespace,hide", |c: &CommonData| &c.namespace)
            .omit_empty();
        fields
            .field("pod,hide", |c: &CommonData| &c.pod)
            .omit_empty();
        fields
            .field("container", |c: &CommonData| &c.container)
            .omit_empty();
    }
}
