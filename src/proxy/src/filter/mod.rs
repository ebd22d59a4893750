//! Row-limit stream transducer: the filter capability that inspects
//! server-to-client traffic and substitutes a synthetic OK response when a
//! result set exceeds a configured row or byte bound.

pub mod transducer;

use bitflags::bitflags;

pub use transducer::{Phase, RowLimitTransducer, SessionState, SYNTHETIC_OK_PACKET};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugFlags: u32 {
        const DECISIONS = 0b01;
        const DISCARDING = 0b10;
    }
}

/// Immutable, constructor-time configuration shared across sessions without
/// synchronization (see `§5 Concurrency & Resource Model`).
#[derive(Debug, Clone)]
pub struct TransducerConfig {
    pub max_resultset_rows: u32,
    pub max_resultset_size: u32,
    pub debug: DebugFlags,
}

impl Default for TransducerConfig {
    fn default() -> Self {
        TransducerConfig {
            max_resultset_rows: u32::MAX,
            max_resultset_size: u32::MAX,
            debug: DebugFlags::empty(),
        }
    }
}

/// Accepts a framed client packet and returns the propagated status, unchanged.
pub trait Downstream {
    fn route(&mut self, packet: &[u8]) -> i32;
}

/// Accepts ownership of an accumulated server buffer (or the synthetic OK
/// packet) and returns the propagated status, unchanged.
pub trait Upstream {
    fn reply(&mut self, bytes: Vec<u8>) -> i32;
}

/// Capability interface a session-bound filter implements. Modeled after the
/// reference's instance-plus-operation-table object, made into a plain trait.
///
/// One call to `on_request` or `on_reply` executes to completion and returns
/// synchronously; there is no reentrancy on the same session (§5).
pub trait Filter {
    fn on_request(&mut self, packet: &[u8]) -> i32;
    fn on_reply(&mut self, chunk: &[u8]) -> i32;
    fn close(&mut self);
}
