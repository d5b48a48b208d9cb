// sentinel-broker/src/consumer.rs
// ============================================================================
// Module: Bulk Consumer
// Description: Batch-pull fallback used when no random-access seek API exists.
// Purpose: Cover event stores that only expose a consuming iterator.
// Dependencies: sentinel_core, std::time::Duration
// ============================================================================

//! ## Overview
//! `spec.md` §4.2's alternative bulk-consumer mode: pull batches until an
//! idle timeout is observed or a batch comes back short, acking each
//! message as it is consumed.

use std::sync::Arc;
use std::time::Duration;

use sentinel_core::NormalizedEvent;
use sentinel_core::interfaces::EventStoreConsumer;
use sentinel_core::interfaces::Logger;

/// Drains an [`EventStoreConsumer`] into normalized events.
pub struct BulkConsumer<C> {
    consumer: C,
    logger: Arc<dyn Logger>,
}

impl<C: EventStoreConsumer> BulkConsumer<C> {
    /// Builds a bulk consumer over `consumer`.
    pub fn new(consumer: C, logger: Arc<dyn Logger>) -> Self {
        Self { consumer, logger }
    }

    /// Pulls batches of up to `max_messages`, waiting up to `idle_heartbeat`
    /// for each, stopping at the first empty or short batch. Acks every
    /// message as it is folded in; an ack failure is logged and otherwise
    /// ignored, since the message has already been normalized.
    pub async fn drain(&self, max_messages: u32, idle_heartbeat: Duration) -> Vec<NormalizedEvent> {
        let mut out = Vec::new();
        loop {
            let batch = match self.consumer.consume(max_messages, idle_heartbeat).await {
                Ok(batch) => batch,
                Err(err) => {
                    self.logger.warn(&format!("bulk consume failed: {err}"));
                    break;
                }
            };
            let batch_len = batch.len();
            for message in &batch {
                if let Ok(event) = sentinel_core::normalize(&message.data, message.seq) {
                    out.push(event);
                }
                if let Err(err) = self.consumer.ack(message.seq).await {
                    self.logger.warn(&format!("ack failed for seq {}: {err}", message.seq));
                }
            }
            if batch_len == 0 || u32::try_from(batch_len).unwrap_or(u32::MAX) < max_messages {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use async_trait::async_trait;
    use sentinel_core::interfaces::ConsumedMessage;
    use sentinel_core::interfaces::EventStoreError;
    use sentinel_core::interfaces::NullLogger;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeConsumer {
        batches: Mutex<Vec<Vec<ConsumedMessage>>>,
        acked: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl EventStoreConsumer for FakeConsumer {
        async fn consume(
            &self,
            _max_messages: u32,
            _idle_heartbeat: Duration,
        ) -> Result<Vec<ConsumedMessage>, EventStoreError> {
            Ok(self.batches.lock().unwrap().pop().unwrap_or_default())
        }

        async fn ack(&self, seq: u64) -> Result<(), EventStoreError> {
            self.acked.lock().unwrap().push(seq);
            Ok(())
        }
    }

    #[tokio::test]
    async fn drains_until_a_short_batch_stops_it() {
        let msg = |seq: u64| ConsumedMessage { seq, data: json!({"type":"session.start","ts":1}) };
        let consumer = FakeConsumer {
            batches: Mutex::new(vec![vec![msg(3)], vec![msg(1), msg(2)]]),
            acked: Mutex::new(Vec::new()),
        };
        let bulk = BulkConsumer::new(consumer, Arc::new(NullLogger));
        let events = bulk.drain(2, Duration::from_millis(10)).await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn every_consumed_message_is_acked() {
        let msg = |seq: u64| ConsumedMessage { seq, data: json!({"type":"session.start","ts":1}) };
        let consumer =
            FakeConsumer { batches: Mutex::new(vec![vec![msg(1)]]), acked: Mutex::new(Vec::new()) };
        let bulk = BulkConsumer::new(consumer, Arc::new(NullLogger));
        bulk.drain(5, Duration::from_millis(10)).await;
        assert_eq!(bulk.consumer.acked.lock().unwrap().as_slice(), &[1]);
    }
}
