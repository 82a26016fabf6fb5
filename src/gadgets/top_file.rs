//! `top file`: per file read/write activity, refreshed every interval.

use serde::Deserialize;

use super::{human_bytes, CommonData};
use crate::columns::{FieldSet, Record, SchemaBuilder};
use crate::error::FormatError;

/// Operations performed on a single file by one thread during an interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Stats {
    #[serde(flatten)]
    pub common: CommonData,
    pub reads: u64,
    pub writes: u64,
    pub rbytes: u64,
    pub wbytes: u64,
    pub pid: u32,
    pub tid: u32,
    #[serde(rename = "mountnsid")]
    pub mntns: u64,
    pub filename: String,
    pub comm: String,
    /// `R` regular file, `S` socket, `O` other.
    #[serde(rename = "fileType")]
    pub file_type: u8,
}

impl Stats {
    /// Entries are accumulated per thread and file.
    pub fn key(&self) -> (u32, u32, String) {
        (self.pid, self.tid, self.filename.clone())
    }

    /// Counters saturate instead of overflowing.
    pub fn merge(&mut self, other: Stats) {
        self.reads = self.reads.saturating_add(other.reads);
        self.writes = self.writes.saturating_add(other.writes);
        self.rbytes = self.rbytes.saturating_add(other.rbytes);
        self.wbytes = self.wbytes.saturating_add(other.wbytes);
    }

    /// Only regular files are reported unless all files are requested.
    pub fn is_regular_file(&self) -> bool {
        self.file_type == b'R'
    }
}

fn file_type(stats: &Stats) -> Result<String, FormatError> {
    match stats.file_type {
        0 => Ok(String::new()),
        b'R' | b'S' | b'O' => Ok(char::from(stats.file_type).to_string()),
        other => Err(FormatError::new(format!("unknown file type {other:#04x}"))),
    }
}

impl FieldSet for Stats {
    fn describe(fields: &mut SchemaBuilder<Self>) {
        fields.embed(|s: &Stats| &s.common);
        fields
            .field("pid,width:7,align:right", |s: &Stats| &s.pid)
            .omit_empty();
        fields
            .field("tid,width:7,align:right", |s: &Stats| &s.tid)
            .omit_empty();
        fields
            .field("comm,width:16,fixed", |s: &Stats| &s.comm)
            .omit_empty();
        fields
            .field("reads,align:right", |s: &Stats| &s.reads)
            .omit_empty();
        fields
            .field("writes,align:right", |s: &Stats| &s.writes)
            .omit_empty();
        fields
            .field("rbytes,align:right", |s: &Stats| &s.rbytes)
            .omit_empty()
            .format(|s: &Stats| Ok(human_bytes(s.rbytes)));
        fields
            .field("wbytes,align:right", |s: &Stats| &s.wbytes)
            .omit_empty()
            .format(|s: &Stats| Ok(human_bytes(s.wbytes)));
        fields
            .field("fileType,width:8", |s: &Stats| &s.file_type)
            .omit_empty()
            .format(file_type);
        fields
            .field("filename,width:40,ellipsis:start", |s: &Stats| &s.filename)
            .omit_empty();
        fields
            .field("mountnsid,width:12,hide", |s: &Stats| &s.mntns)
            .omit_empty();
    }
}

impl Record for Stats {
    const DEFAULT_SORT: &'static [&'static str] = &["-reads", "-writes", "-rbytes", "-wbytes"];

    crate::record_registration!(Stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{columns_of, register, Group};
    use crate::output::OutputFormat;
    use crate::report::Report;

    fn stats(pid: u32, comm: &str, reads: u64, rbytes: u64, file_type: u8, filename: &str) -> Stats {
        Stats {
            pid,
            tid: pid,
            comm: comm.to_string(),
            reads,
            rbytes,
            file_type,
            filename: filename.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_schema_layout() {
        let columns = columns_of::<Stats>().unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "node", "namespace", "pod", "container", "pid", "tid", "comm", "reads",
                "writes", "rbytes", "wbytes", "fileType", "filename", "mountnsid"
            ]
        );
        assert_eq!(columns[3].group(), Group::Header);
        assert_eq!(columns[4].group(), Group::Gadget);
        assert_eq!(
            register::<Stats>().unwrap().default_sort(),
            &["-reads", "-writes", "-rbytes", "-wbytes"]
        );
    }

    #[test]
    fn test_table_with_projection() {
        let mut report = Report::<Stats>::new().unwrap();
        report
            .set_columns(&["comm", "reads", "rbytes", "filetype", "filename"])
            .unwrap();
        let out = report
            .process(vec![
                stats(100, "cat", 3, 4096, b'R', "/etc/passwd"),
                stats(200, "nginx", 10, 1536, b'S', "socket:[1234]"),
            ])
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "COMM             READS  RBYTES FILETYPE FILENAME");
        assert_eq!(lines[1], "nginx               10 1.5 KiB S        socket:[1234]");
        assert_eq!(lines[2], "cat                  3 4.0 KiB R        /etc/passwd");
    }

    #[test]
    fn test_unknown_file_type_placeholder() {
        let mut report = Report::<Stats>::new().unwrap();
        report.set_columns(&["pid", "fileType"]).unwrap();
        let out = report.process(vec![stats(1, "a", 1, 0, b'X', "f")]).unwrap();
        assert_eq!(out, "    PID FILETYPE\n      1 <?>\n");
    }

    #[test]
    fn test_long_filename_keeps_tail() {
        let mut report = Report::<Stats>::new().unwrap();
        report.set_columns(&["filename"]).unwrap();
        let path = "/run/containerd/io.containerd.runtime.v2.task/k8s.io/rootfs/usr/lib/libc.so.6";
        let out = report.process(vec![stats(1, "a", 1, 0, b'R', path)]).unwrap();
        let cell = out.lines().nth(1).unwrap();
        assert_eq!(cell.chars().count(), 40);
        assert!(cell.starts_with('…'));
        assert!(cell.ends_with("/usr/lib/libc.so.6"));
    }

    #[test]
    fn test_filter_compares_raw_bytes() {
        let mut report = Report::<Stats>::new().unwrap();
        report.set_filters(&["rbytes:>2000"]).unwrap();
        let kept = report.prepare(vec![
            stats(1, "a", 1, 4096, b'R', "x"),
            stats(2, "b", 9, 1536, b'R', "y"),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].pid, 1);
    }

    #[test]
    fn test_regex_matches_formatted_bytes() {
        let mut report = Report::<Stats>::new().unwrap();
        report.set_filters(&["rbytes:~KiB$", "fileType:~^R$"]).unwrap();
        let kept = report.prepare(vec![
            stats(1, "a", 1, 4096, b'R', "x"),
            stats(2, "b", 1, 512, b'R', "y"),
            stats(3, "c", 1, 2048, b'S', "z"),
        ]);
        let pids: Vec<u32> = kept.iter().map(|s| s.pid).collect();
        assert_eq!(pids, vec![1]);
    }

    #[test]
    fn test_json_round_trip_names() {
        let line = r#"{"container":"web","pid":42,"tid":43,"comm":"cat","reads":2,"rbytes":10,"filename":"/etc/hosts","fileType":82,"mountnsid":4026532270}"#;
        let parsed: Stats = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.common.container, "web");
        assert_eq!(parsed.file_type, b'R');
        assert_eq!(parsed.mntns, 4026532270);

        let report = Report::<Stats>::new().unwrap().with_format(OutputFormat::Json);
        let out = report.process(vec![parsed]).unwrap();
        assert_eq!(
            out.trim_end(),
            r#"{"container":"web","pid":42,"tid":43,"comm":"cat","reads":2,"rbytes":10,"fileType":82,"filename":"/etc/hosts","mountnsid":4026532270}"#
        );
    }

    #[test]
    fn test_merge_adds_counters() {
        let mut a = stats(1, "a", 1, 100, b'R', "f");
        a.writes = 2;
        let mut b = stats(1, "a", 4, 50, b'R', "f");
        b.wbytes = 7;
        assert_eq!(a.key(), b.key());
        a.merge(b);
        assert_eq!((a.reads, a.writes, a.rbytes, a.wbytes), (5, 2, 150, 7));
    }

    #[test]
    fn test_merge_saturates() {
        let mut a = stats(1, "a", u64::MAX, u64::MAX, b'R', "f");
        a.merge(stats(1, "a", 1, 1, b'R', "f"));
        assert_eq!((a.reads, a.rbytes), (u64::MAX, u64::MAX));
    }

    #[test]
    fn test_columns_use_gadget_names() {
        let mut report = Report::<Stats>::new().unwrap();
        report.set_sort(&["-fileType"]).unwrap();
        report
            .set_filters(&["mountnsid:4026532270", "filetype:!O"])
            .unwrap();
        let mut sock = stats(2, "b", 1, 0, b'S', "socket:[1]");
        sock.mntns = 4026532270;
        let mut file = stats(1, "a", 1, 0, b'R', "/etc/hosts");
        file.mntns = 4026532270;
        let mut other = stats(3, "c", 1, 0, b'O', "/dev/null");
        other.mntns = 4026532270;
        let kept = report.prepare(vec![file, stats(4, "d", 1, 0, b'R', "/x"), sock, other]);
        let pids: Vec<u32> = kept.iter().map(|s| s.pid).collect();
        assert_eq!(pids, vec![2, 1]);
    }

    #[test]
    fn test_regular_file_check() {
        assert!(stats(1, "a", 1, 0, b'R', "/etc/hosts").is_regular_file());
        assert!(!stats(1, "a", 1, 0, b'S', "socket:[1]").is_regular_file());
        assert!(!stats(1, "a", 1, 0, b'O', "/dev/null").is_regular_file());
    }
}
