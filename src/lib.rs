//! Decodes WPILOG robot telemetry logs into a typed, timestamp-ordered field
//! store and runs interval/value analyses over it.
//!
//! # Pipeline
//!
//! - [`datalog`] parses the WPILOG binary framing into a stream of
//!   control and data records.
//! - [`struct_support`] compiles WPILib struct schema text into
//!   bit-precise layouts and decodes struct-encoded payloads against them.
//! - [`log_store`] is the keyed, type-tagged, timestamp-ordered column
//!   store every decoded sample lands in.
//! - [`ingest`] binds the record stream to field-store writes, routing
//!   by declared record type and expanding structured payloads (structs,
//!   JSON, MessagePack) into `key/child` hierarchies.
//! - [`analysis`] runs generic interval and event-triggered queries
//!   over a populated [`log_store::Log`].
//!
//! [`config`] and [`error`] are the ambient configuration and error
//! taxonomy shared across the pipeline; `main.rs` is the CLI driver that
//! wires all of the above together over a directory of `.wpilog` files.
//!
//! # Example
//!
//! ```no_run
//! use wpilog_analyzer::ingest::Ingester;
//!
//! let bytes = std::fs::read("robot.wpilog")?;
//! let mut ingester = Ingester::new();
//! ingester.ingest_bytes(&bytes)?;
//!
//! let log = ingester.log();
//! if let Some(range) = log.get_number("/x", 0.0, 10.0) {
//!     println!("{} samples", range.timestamps.len());
//! }
//! # Ok::<(), wpilog_analyzer::WpilogError>(())
//! ```

pub mod analysis;
pub mod config;
pub mod datalog;
pub mod error;
pub mod ingest;
pub mod log_store;
pub mod struct_support;
pub mod value;

pub use error::{Result, WpilogError};
pub use ingest::Ingester;
pub use log_store::Log;

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_wpilog() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"WPILOG");
        data.extend_from_slice(&0x0100u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());

        // Start control record for entry ID 1, name "/x", type "double".
        let mut start_payload = vec![0u8]; // control type: Start
        start_payload.extend_from_slice(&1u32.to_le_bytes());
        for s in ["/x", "double", ""] {
            start_payload.extend_from_slice(&(s.len() as u32).to_le_bytes());
            start_payload.extend_from_slice(s.as_bytes());
        }
        push_record(&mut data, 0, 0, &start_payload);

        // Data record for entry 1 at t=1s, value 3.14.
        push_record(&mut data, 1, 1_000_000, &3.14f64.to_le_bytes());

        data
    }

    fn push_record(out: &mut Vec<u8>, entry: u32, timestamp_us: u64, payload: &[u8]) {
        out.push(0b0111_1111u8); // entry_len=4, size_len=4, timestamp_len=8
        out.extend_from_slice(&entry.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&timestamp_us.to_le_bytes());
        out.extend_from_slice(payload);
    }

    #[test]
    fn ingests_minimal_log_into_a_numeric_field() {
        let mut ingester = Ingester::new();
        ingester.ingest_bytes(&minimal_wpilog()).unwrap();

        let range = ingester.log().get_number("/x", 0.0, 2.0).unwrap();
        assert_eq!(range.timestamps, vec![1.0]);
    }
}
