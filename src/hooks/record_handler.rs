//! JSON hook handler.

use std::sync::Arc;

use tracing::instrument;

use super::{HookEvent, HookHandler, LifecycleHooks};
use crate::Result;
use crate::models::MutatingRecord;

/// Handles one lifecycle event for a record serialized as JSON.
pub struct RecordHookHandler {
    event: HookEvent,
    hooks: Arc<dyn LifecycleHooks>,
}

impl RecordHookHandler {
    /// Creates a handler for `event`.
    #[must_use]
    pub fn new(event: HookEvent, hooks: Arc<dyn LifecycleHooks>) -> Self {
        Self { event, hooks }
    }
}

impl HookHandler for RecordHookHandler {
    fn event_type(&self) -> &'static str {
        self.event.as_str()
    }

    #[instrument(skip(self, input), fields(hook = self.event.as_str(), input_len = input.len()))]
    fn handle(&self, input: &str) -> Result<String> {
        let record = MutatingRecord::from_json(input)?;
        let cleaned = self.hooks.dispatch(self.event, &record)?;
        cleaned.to_json()
    }
}
