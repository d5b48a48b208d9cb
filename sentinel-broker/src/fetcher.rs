// sentinel-broker/src/fetcher.rs
// ============================================================================
// Module: Event Fetcher
// Description: Binary-search seek plus sequential walk over a random-access event store.
// Purpose: Avoid scanning from seq=1 on every trace run.
// Dependencies: sentinel_core, std::sync::Arc
// ============================================================================

//! ## Overview
//! `spec.md` §4.2: a lazy, restartable sequence of normalized events within
//! `[startMs, endMs)`. Because scanning from `seq=1` is too costly, the
//! fetcher binary-searches `[first_seq, last_seq]` for the first sequence
//! whose timestamp is at or after `start_ms` (a storage miss is treated as
//! "before target"), then walks forward sequentially, tolerating up to 50
//! consecutive missing sequences before giving up. A transport error logs a
//! warning and returns what was already collected; a short stream is not an
//! error.

use std::sync::Arc;

use sentinel_core::NormalizedEvent;
use sentinel_core::SkipReason;
use sentinel_core::interfaces::EventStoreTransport;
use sentinel_core::interfaces::Logger;
use serde_json::Value;

use crate::filter::EventFilter;

/// Consecutive missing sequences tolerated before the sequential walk gives up.
const MAX_CONSECUTIVE_MISSES: u32 = 50;

/// Fetches normalized events from a random-access event-store transport.
pub struct EventFetcher<T> {
    transport: T,
    stream: String,
    logger: Arc<dyn Logger>,
}

impl<T: EventStoreTransport> EventFetcher<T> {
    /// Builds a fetcher over `transport` for `stream`.
    pub fn new(transport: T, stream: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self { transport, stream: stream.into(), logger }
    }

    /// Fetches every normalized event in `[start_ms, end_ms)` that passes
    /// `filter`, stopping early once `filter.max_count` is reached.
    pub async fn fetch(&self, start_ms: i64, end_ms: i64, filter: &EventFilter) -> Vec<NormalizedEvent> {
        let info = match self.transport.info(&self.stream).await {
            Ok(info) => info,
            Err(err) => {
                self.logger.warn(&format!("event store info() failed: {err}"));
                return Vec::new();
            }
        };
        if info.last_seq < info.first_seq {
            return Vec::new();
        }
        let start_seq = self.binary_search_start(info.first_seq, info.last_seq, start_ms).await;
        self.walk_forward(start_seq, info.last_seq, start_ms, end_ms, filter).await
    }

    async fn get_timestamp(&self, seq: u64) -> Option<i64> {
        match self.transport.get_message(&self.stream, seq).await {
            Ok(Some(raw)) => extract_timestamp(&raw.data),
            Ok(None) | Err(_) => None,
        }
    }

    /// Returns the first sequence in `[first, last]` whose timestamp is at
    /// or after `target_ms`. A storage miss at a probed sequence is treated
    /// as "before target" per `spec.md` §4.2.
    async fn binary_search_start(&self, first: u64, last: u64, target_ms: i64) -> u64 {
        let mut lo = first;
        let mut hi = last;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.get_timestamp(mid).await {
                Some(ts) if ts >= target_ms => hi = mid,
                _ => lo = mid + 1,
            }
        }
        lo
    }

    async fn walk_forward(
        &self,
        start_seq: u64,
        last_seq: u64,
        start_ms: i64,
        end_ms: i64,
        filter: &EventFilter,
    ) -> Vec<NormalizedEvent> {
        let mut out = Vec::new();
        let mut seq = start_seq;
        let mut consecutive_misses = 0u32;
        while seq <= last_seq {
            match self.transport.get_message(&self.stream, seq).await {
                Ok(Some(raw)) => {
                    consecutive_misses = 0;
                    if self.handle_message(raw.seq, &raw.data, start_ms, end_ms, filter, &mut out) {
                        break;
                    }
                }
                Ok(None) => {
                    consecutive_misses += 1;
                    if consecutive_misses > MAX_CONSECUTIVE_MISSES {
                        self.logger.warn("giving up: exceeded 50 consecutive missing sequences");
                        break;
                    }
                }
                Err(err) => {
                    self.logger.warn(&format!("event store transport error: {err}"));
                    break;
                }
            }
            seq += 1;
        }
        out
    }

    /// Normalizes one raw record and folds it into `out`. Returns `true`
    /// when the walk should stop (past `end_ms`, or `max_count` reached).
    fn handle_message(
        &self,
        seq: u64,
        data: &Value,
        start_ms: i64,
        end_ms: i64,
        filter: &EventFilter,
        out: &mut Vec<NormalizedEvent>,
    ) -> bool {
        let event = match sentinel_core::normalize(data, seq) {
            Ok(event) => event,
            Err(SkipReason::MissingTimestamp | SkipReason::UnknownKind) => return false,
        };
        if event.timestamp_ms < start_ms {
            return false;
        }
        if event.timestamp_ms > end_ms {
            return true;
        }
        if filter.matches(&event) {
            out.push(event);
            if filter.max_count.is_some_and(|max| out.len() >= max) {
                return true;
            }
        }
        false
    }
}

fn extract_timestamp(raw: &Value) -> Option<i64> {
    raw.get("ts").and_then(Value::as_i64).or_else(|| raw.get("timestamp").and_then(Value::as_i64))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use async_trait::async_trait;
    use sentinel_core::interfaces::EventStoreError;
    use sentinel_core::interfaces::NullLogger;
    use sentinel_core::interfaces::RawMessage;
    use sentinel_core::interfaces::StreamInfo;
    use serde_json::json;
    use std::collections::HashMap;

    struct FakeTransport {
        messages: HashMap<u64, Value>,
        first_seq: u64,
        last_seq: u64,
    }

    #[async_trait]
    impl EventStoreTransport for FakeTransport {
        async fn get_message(&self, _stream: &str, seq: u64) -> Result<Option<RawMessage>, EventStoreError> {
            Ok(self.messages.get(&seq).map(|data| RawMessage { seq, data: data.clone() }))
        }

        async fn info(&self, _stream: &str) -> Result<StreamInfo, EventStoreError> {
            Ok(StreamInfo { first_seq: self.first_seq, last_seq: self.last_seq, messages: self.messages.len() as u64 })
        }
    }

    fn make_transport(count: u64) -> FakeTransport {
        let mut messages = HashMap::new();
        for seq in 1..=count {
            messages.insert(
                seq,
                json!({"type":"tool.call","toolName":"read","ts": 1_000 * i64::try_from(seq).unwrap(), "params": {}}),
            );
        }
        FakeTransport { messages, first_seq: 1, last_seq: count }
    }

    #[tokio::test]
    async fn fetch_returns_events_within_window() {
        let transport = make_transport(20);
        let fetcher = EventFetcher::new(transport, "stream", Arc::new(NullLogger));
        let events = fetcher.fetch(5_000, 10_000, &EventFilter::default()).await;
        assert!(events.iter().all(|e| e.timestamp_ms >= 5_000 && e.timestamp_ms <= 10_000));
        assert!(events.first().unwrap().timestamp_ms >= 5_000);
    }

    #[tokio::test]
    async fn fetch_tolerates_gaps_in_sequence() {
        let mut transport = make_transport(10);
        transport.messages.remove(&5);
        transport.messages.remove(&6);
        let fetcher = EventFetcher::new(transport, "stream", Arc::new(NullLogger));
        let events = fetcher.fetch(0, 100_000, &EventFilter::default()).await;
        assert_eq!(events.len(), 8);
    }

    #[tokio::test]
    async fn empty_stream_yields_no_events() {
        let transport = FakeTransport { messages: HashMap::new(), first_seq: 1, last_seq: 0 };
        let fetcher = EventFetcher::new(transport, "stream", Arc::new(NullLogger));
        let events = fetcher.fetch(0, 1, &EventFilter::default()).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn max_count_stops_the_walk_early() {
        let transport = make_transport(50);
        let fetcher = EventFetcher::new(transport, "stream", Arc::new(NullLogger));
        let filter = EventFilter { max_count: Some(3), ..EventFilter::default() };
        let events = fetcher.fetch(0, 1_000_000, &filter).await;
        assert_eq!(events.len(), 3);
    }
}
