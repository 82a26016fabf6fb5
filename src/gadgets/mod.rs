//! Record types of the gadgets this binary can report on.
//!
//! Every record embeds [`CommonData`] and declares its own process columns.

mod common;
pub mod top_file;
pub mod trace_signal;

pub use common::CommonData;

/// Human readable byte count with binary prefixes, e.g. `1.5 KiB`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    // Compare after rounding to one decimal so 1023.96 KiB prints as 1.0 MiB.
    while unit < UNITS.len() - 1 && (value * 10.0).round() >= 10240.0 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
