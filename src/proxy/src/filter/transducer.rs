//! State machine driving the row-limit decision across a single MySQL
//! request/response session. Grounded on the reference's
//! `handle_expecting_response` / `handle_expecting_fields` / `handle_rows`
//! phase handlers: a result-set column-count header, a run of field
//! definition packets, an EOF, a run of row packets (possibly split across
//! large-packet continuations), and a terminating EOF or ERR.

use std::sync::Arc;

use crate::codec::{leint_value, leint_width, read_header, PacketHeader};
use crate::protocol::mysql::constants::{
    CommandCode, MYSQL_PACKET_LENGTH_MAX, SERVER_MORE_RESULTS_EXIST,
};

use super::{DebugFlags, Downstream, Filter, TransducerConfig, Upstream};

/// Literal bytes of a zero-affected-rows, no-warnings OK packet with sequence
/// id 1, substituted in place of a discarded result set.
pub const SYNTHETIC_OK_PACKET: [u8; 11] =
    [0x07, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first packet of a response: OK, ERR, LOCAL INFILE
    /// request, or a result-set column-count header.
    ExpectingResponse,
    /// Consuming field-definition packets until the field-list EOF.
    ExpectingFields,
    /// Consuming row packets until the terminating EOF or ERR.
    ExpectingRows,
    /// The response for the current request has been fully forwarded (or
    /// synthesized); further bytes before the next request are an anomaly.
    ExpectingNothing,
    /// A request this filter does not track is in flight; replies are
    /// forwarded untouched until the next tracked request.
    Ignoring,
}

#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    pending: Vec<u8>,
    cursor: usize,
    n_total_fields: u64,
    n_fields_seen: u64,
    n_rows: u64,
    in_large_packet: bool,
    discard: bool,
    n_dropped: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            phase: Phase::ExpectingResponse,
            pending: Vec::new(),
            cursor: 0,
            n_total_fields: 0,
            n_fields_seen: 0,
            n_rows: 0,
            in_large_packet: false,
            discard: false,
            n_dropped: 0,
        }
    }
}

impl SessionState {
    fn reset_for_response(&mut self) {
        self.phase = Phase::ExpectingResponse;
        self.pending.clear();
        self.cursor = 0;
        self.reset_field_tracking();
        self.n_rows = 0;
        self.discard = false;
    }

    fn mark_discard(&mut self) {
        if !self.discard {
            self.discard = true;
            self.n_dropped += 1;
        }
    }

    /// Clears the field-list bookkeeping the `ExpectingFields`/`ExpectingRows`
    /// phases accumulate. The reference's `handle_expecting_response` resets
    /// these on every invocation, including re-entry from a multi-result-set
    /// EOF, not only on a fresh request.
    fn reset_field_tracking(&mut self) {
        self.n_total_fields = 0;
        self.n_fields_seen = 0;
        self.in_large_packet = false;
    }
}

/// Returns the header and total on-wire length (header + payload) of the
/// framed packet starting at `cursor`, or `None` if `pending` doesn't yet
/// hold a complete packet there.
fn frame_at(pending: &[u8], cursor: usize) -> Option<(PacketHeader, usize)> {
    let rest = pending.get(cursor..)?;
    let header = read_header(rest).ok()?;
    let total = 4 + header.payload_len as usize;
    if rest.len() < total {
        return None;
    }
    Some((header, total))
}

/// Row-limit stream transducer: wraps a downstream request sink and an
/// upstream reply sink, inspecting (never rewriting, except for synthesis)
/// the bytes that flow between them.
pub struct RowLimitTransducer<D, U> {
    config: Arc<TransducerConfig>,
    downstream: D,
    upstream: U,
    state: SessionState,
}

impl<D, U> RowLimitTransducer<D, U> {
    pub fn new(config: Arc<TransducerConfig>, downstream: D, upstream: U) -> Self {
        RowLimitTransducer {
            config,
            downstream,
            upstream,
            state: SessionState::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Cumulative count of result sets this session has discarded in favor
    /// of a synthetic OK, across its whole lifetime (never reset).
    pub fn dropped_count(&self) -> u64 {
        self.state.n_dropped
    }

    pub fn current_row_count(&self) -> u64 {
        self.state.n_rows
    }
}

impl<D: Downstream, U: Upstream> RowLimitTransducer<D, U> {
    /// Forwards the buffered response as-is, or substitutes the synthetic OK
    /// packet if the current result set has been marked for discard.
    fn forward_or_synthesize(&mut self) -> i32 {
        let status = if self.state.discard {
            if self.config.debug.contains(DebugFlags::DISCARDING) {
                tracing::debug!(
                    n_rows = self.state.n_rows,
                    bytes = self.state.pending.len(),
                    "substituting synthetic OK for discarded result set"
                );
            }
            self.upstream.reply(SYNTHETIC_OK_PACKET.to_vec())
        } else {
            let buf = std::mem::take(&mut self.state.pending);
            self.upstream.reply(buf)
        };
        self.state.pending.clear();
        self.state.cursor = 0;
        status
    }

    /// Forwards the buffered response unconditionally, ignoring `discard`:
    /// used for LOCAL INFILE requests, which this filter never inspects.
    fn forward_unconditionally(&mut self) -> i32 {
        let buf = std::mem::take(&mut self.state.pending);
        let status = self.upstream.reply(buf);
        self.state.cursor = 0;
        status
    }

    /// Drops whatever is buffered and replies with the synthetic OK,
    /// regardless of `discard`. The reference's malformed/short-EOF branch
    /// takes this path unconditionally, unlike every other decision point.
    fn emit_synthetic_ok_unconditionally(&mut self) -> i32 {
        self.state.pending.clear();
        self.state.cursor = 0;
        self.upstream.reply(SYNTHETIC_OK_PACKET.to_vec())
    }

    /// A decode anomaly that can't be classified: forward what's buffered
    /// and stop tracking the rest of this response.
    fn fallback_forward_and_ignore(&mut self, reason: &str) -> i32 {
        tracing::warn!(%reason, "protocol anomaly, forwarding buffered bytes and ignoring rest of response");
        let buf = std::mem::take(&mut self.state.pending);
        let status = self.upstream.reply(buf);
        self.state.cursor = 0;
        self.state.phase = Phase::Ignoring;
        status
    }

    fn check_row_limit(&mut self) {
        if !self.state.discard && self.state.n_rows > self.config.max_resultset_rows as u64 {
            self.state.mark_discard();
        }
    }

    fn check_size_limit(&mut self) {
        if !self.state.discard
            && self.state.pending.len() > self.config.max_resultset_size as usize
        {
            self.state.mark_discard();
        }
    }

    fn on_request_impl(&mut self, packet: &[u8]) -> i32 {
        let resets = packet
            .first()
            .map(|op| {
                *op == CommandCode::ComQuery as u8 || *op == CommandCode::ComStmtExecute as u8
            })
            .unwrap_or(false);
        if resets {
            self.state.reset_for_response();
        } else {
            self.state.phase = Phase::Ignoring;
            self.state.pending.clear();
            self.state.cursor = 0;
        }
        self.downstream.route(packet)
    }

    fn on_reply_impl(&mut self, chunk: &[u8]) -> i32 {
        match self.state.phase {
            Phase::Ignoring => return self.upstream.reply(chunk.to_vec()),
            Phase::ExpectingNothing => {
                tracing::warn!("data received while expecting nothing; forwarding");
                return self.upstream.reply(chunk.to_vec());
            }
            _ => {}
        }

        self.state.pending.extend_from_slice(chunk);
        self.check_size_limit();

        let mut status = 0;
        loop {
            match self.state.phase {
                Phase::ExpectingResponse => {
                    // re-entry from a multi-result-set EOF carries no field-list
                    // state of its own; the reference clears it on every entry.
                    self.state.reset_field_tracking();
                    let Some((_, total)) = frame_at(&self.state.pending, self.state.cursor) else {
                        break;
                    };
                    let payload_start = self.state.cursor + 4;
                    let opcode = self.state.pending[payload_start];
                    match opcode {
                        0x00 | 0xFF => {
                            self.state.cursor += total;
                            status = self.forward_or_synthesize();
                            self.state.phase = Phase::ExpectingNothing;
                            break;
                        }
                        0xFB => {
                            self.state.cursor += total;
                            status = self.forward_unconditionally();
                            self.state.phase = Phase::Ignoring;
                            break;
                        }
                        _ => match leint_width(opcode) {
                            Err(_) => {
                                status = self.fallback_forward_and_ignore("malformed result-set header");
                                break;
                            }
                            Ok(_) => {
                                let (n_fields, consumed) =
                                    match leint_value(&self.state.pending[payload_start..]) {
                                        Ok(v) => v,
                                        Err(_) => {
                                            status = self.fallback_forward_and_ignore(
                                                "malformed field-count leint",
                                            );
                                            break;
                                        }
                                    };
                                self.state.n_total_fields = n_fields;
                                self.state.cursor += 4 + consumed;
                                self.state.phase = Phase::ExpectingFields;
                            }
                        },
                    }
                }
                Phase::ExpectingFields => {
                    let Some((_, total)) = frame_at(&self.state.pending, self.state.cursor) else {
                        break;
                    };
                    let payload_start = self.state.cursor + 4;
                    let opcode = self.state.pending[payload_start];
                    self.state.cursor += total;
                    if opcode == 0xFE {
                        self.state.phase = Phase::ExpectingRows;
                    } else {
                        self.state.n_fields_seen += 1;
                        debug_assert!(self.state.n_fields_seen <= self.state.n_total_fields);
                    }
                }
                Phase::ExpectingRows => {
                    let Some((header, total)) = frame_at(&self.state.pending, self.state.cursor)
                    else {
                        break;
                    };

                    // a tiny fragment arriving while a large-packet continuation is
                    // pending is a terminator, not a new logical packet: count the
                    // row it completes and stop without reclassifying its opcode.
                    if self.state.in_large_packet && total < 9 {
                        self.state.cursor += total;
                        self.state.in_large_packet = false;
                        self.state.n_rows += 1;
                        self.check_row_limit();
                        continue;
                    }

                    if header.payload_len == MYSQL_PACKET_LENGTH_MAX {
                        self.state.in_large_packet = true;
                        self.state.cursor += total;
                        continue;
                    }
                    self.state.in_large_packet = false;

                    let payload_start = self.state.cursor + 4;
                    let opcode = self.state.pending[payload_start];
                    match opcode {
                        0xFF => {
                            self.state.cursor += total;
                            status = self.forward_or_synthesize();
                            self.state.phase = Phase::ExpectingNothing;
                            break;
                        }
                        0xFE if total < 9 => {
                            // malformed/short EOF: the reference normalizes to OK
                            // unconditionally, ignoring `discard` entirely.
                            self.state.cursor += total;
                            tracing::warn!("short EOF packet in row stream, normalizing to OK");
                            status = self.emit_synthetic_ok_unconditionally();
                            self.state.phase = Phase::ExpectingNothing;
                            break;
                        }
                        0xFE => {
                            self.state.cursor += total;
                            let flags = u16::from_le_bytes([
                                self.state.pending[payload_start + 3],
                                self.state.pending[payload_start + 4],
                            ]);
                            if flags & SERVER_MORE_RESULTS_EXIST == 0 {
                                status = self.forward_or_synthesize();
                                self.state.phase = Phase::ExpectingNothing;
                                break;
                            } else {
                                self.state.phase = Phase::ExpectingResponse;
                            }
                        }
                        _ => {
                            self.state.cursor += total;
                            self.state.n_rows += 1;
                            self.check_row_limit();
                        }
                    }
                }
                Phase::ExpectingNothing | Phase::Ignoring => unreachable!("handled above"),
            }
        }
        status
    }
}

impl<D: Downstream, U: Upstream> Filter for RowLimitTransducer<D, U> {
    fn on_request(&mut self, packet: &[u8]) -> i32 {
        self.on_request_impl(packet)
    }

    fn on_reply(&mut self, chunk: &[u8]) -> i32 {
        self.on_reply_impl(chunk)
    }

    fn close(&mut self) {
        self.state = SessionState::default();
    }
}
