use std::sync::Arc;

use crate::ws::registry::SubscriberSet;

/// Shared handles available to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub subscribers: Arc<SubscriberSet>,
}

impl AppState {
    pub fn new(subscribers: Arc<SubscriberSet>) -> Self {
        Self { subscribers }
    }
}
