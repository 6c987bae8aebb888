// src/notify/recording.rs
//! In-memory sender: records what would have been posted. Used by the demo
//! binary and by tests; can be told to fail or stall for given destinations.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use super::format::RenderedMessage;
use super::{DeliveryError, Destination, DestinationSender};

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(Destination, RenderedMessage)>>,
    failing: HashMap<Destination, u16>,
    delays: HashMap<Destination, Duration>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to `destination` fail: 403 → Forbidden, 404 → InvalidDestination,
    /// anything else → Rejected.
    pub fn with_failure(mut self, destination: Destination, status: u16) -> Self {
        self.failing.insert(destination, status);
        self
    }

    pub fn with_delay(mut self, destination: Destination, delay: Duration) -> Self {
        self.delays.insert(destination, delay);
        self
    }

    pub fn sent(&self) -> Vec<(Destination, RenderedMessage)> {
        self.sent.lock().clone()
    }

    /// Destinations that received a message, sorted.
    pub fn destinations(&self) -> Vec<Destination> {
        let mut out: Vec<Destination> = self.sent.lock().iter().map(|(d, _)| d.clone()).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl DestinationSender for RecordingSender {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(
        &self,
        destination: &Destination,
        message: &RenderedMessage,
    ) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delays.get(destination) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(status) = self.failing.get(destination) {
            return Err(match status {
                403 => DeliveryError::Forbidden(destination.clone()),
                404 => DeliveryError::InvalidDestination(destination.clone()),
                s => DeliveryError::Rejected {
                    status: *s,
                    body: "simulated failure".into(),
                },
            });
        }
        self.sent.lock().push((destination.clone(), message.clone()));
        Ok(())
    }
}
