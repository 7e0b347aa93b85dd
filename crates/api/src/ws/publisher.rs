use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};
use uttercast_pipeline::ResultEvent;

use super::registry::SubscriberSet;

/// Long-lived fan-out task bridging the producer pipeline and the
/// subscriber connections.
///
/// Each event is serialized once and queued to every live subscriber.
/// Exits when the producer side of the channel is dropped.
pub async fn run(mut events: UnboundedReceiver<ResultEvent>, subscribers: Arc<SubscriberSet>) {
    while let Some(event) = events.recv().await {
        match serde_json::to_string(&event) {
            Ok(text) => subscribers.broadcast(&text),
            Err(e) => warn!(%e, "failed to serialize result event"),
        }
    }
    debug!("result channel closed, publisher exiting");
}
