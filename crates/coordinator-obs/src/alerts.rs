//! Operator alert signal (spec §4.1's "emit an operator alert signal"): a
//! lightweight in-process broadcast any worker's permanent-failure path
//! publishes to. A real deployment fans this into PagerDuty/Slack; here the
//! hook is real, and callers mirror the same alert into the process log so
//! the on-disk audit trail and any live subscriber agree.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct OperatorAlert {
    pub worker: String,
    pub scope_key: Option<String>,
    pub message: String,
    pub ts: i64,
}

#[derive(Clone)]
pub struct AlertBus {
    sender: broadcast::Sender<OperatorAlert>,
}

impl Default for AlertBus {
    fn default() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl AlertBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an alert. Returns without error when there are no
    /// subscribers; a dropped alert with nobody listening isn't a failure.
    pub fn publish(&self, alert: OperatorAlert) {
        let _ = self.sender.send(alert);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OperatorAlert> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_subscriber_receives_a_published_alert() {
        let bus = AlertBus::new();
        let mut rx = bus.subscribe();

        bus.publish(OperatorAlert {
            worker: "feed".to_string(),
            scope_key: Some("pyth/BTC/price/1s".to_string()),
            message: "permanent feed poll failure".to_string(),
            ts: 1_700_000_000,
        });

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.worker, "feed");
        assert_eq!(alert.scope_key.as_deref(), Some("pyth/BTC/price/1s"));
    }

    #[tokio::test]
    async fn publishing_with_no_subscribers_does_not_panic() {
        let bus = AlertBus::new();
        bus.publish(OperatorAlert {
            worker: "score".to_string(),
            scope_key: None,
            message: "no one is listening".to_string(),
            ts: 1,
        });
    }
}
