//! `trace signal`: one event per signal sent between processes.

use serde::Deserialize;

use super::CommonData;
use crate::columns::{FieldSet, Record, SchemaBuilder};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Event {
    #[serde(flatten)]
    pub common: CommonData,
    /// Nanoseconds since boot.
    pub timestamp: u64,
    pub pid: u32,
    pub comm: String,
    pub signal: String,
    /// Target pid.
    pub tpid: u32,
    /// Return value of the kill syscall.
    pub ret: i32,
    #[serde(rename = "mountnsid")]
    pub mntns: u64,
}

impl FieldSet for Event {
    fn describe(fields: &mut SchemaBuilder<Self>) {
        fields.embed(|e: &Event| &e.common);
        fields
            .field("timestamp,hide", |e: &Event| &e.timestamp)
            .omit_empty();
        fields
            .field("pid,width:7,fixed", |e: &Event| &e.pid)
            .omit_empty();
        fields
            .field("comm,width:16,fixed", |e: &Event| &e.comm)
            .omit_empty();
        fields
            .field("signal,width:6,fixed,ellipsis:start", |e: &Event| &e.signal)
            .omit_empty();
        fields
            .field("tpid,width:7,fixed", |e: &Event| &e.tpid)
            .omit_empty();
        fields
            .field("ret,width:3,fixed", |e: &Event| &e.ret)
            .omit_empty();
        fields
            .field("mntns,width:12,hide", |e: &Event| &e.mntns)
            .json("mountnsid")
            .omit_empty();
    }
}

impl Record for Event {
    /// Arrival order.
    const DEFAULT_SORT: &'static [&'static str] = &["timestamp"];

    crate::record_registration!(Event);
}
