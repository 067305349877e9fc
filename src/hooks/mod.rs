//! Ticket lifecycle hooks.
//!
//! The host calls the cleaner at four points of a record's life:
//!
//! | Event | Method | Text filters | Attachment dedup |
//! |-------|--------|--------------|------------------|
//! | Ticket creation | `on_before_create` | yes | yes |
//! | Followup creation | `on_before_create_followup` | yes | yes |
//! | Ticket update | `on_before_update` | yes | no |
//! | Followup update | `on_before_update_followup` | yes | no |
//!
//! Hooks never mutate their input; they return the record the host should
//! save. Only a storage failure is returned as an error, every other problem
//! (bad filter, unreadable attachment, missing fields) is logged and the
//! record goes through.
//!
//! # JSON surface
//!
//! [`RecordHookHandler`] wraps a [`LifecycleHooks`] implementation behind the
//! [`HookHandler`] string interface used by the command line: the record comes
//! in as a JSON object and the cleaned record goes out the same way.
//!
//! ```json
//! {"name": "Printer", "content": "Hi #T1#", "_mailgate": 1,
//!  "_filename": ["logo.png"], "_tag": ["T1"], "entities_id": 0}
//! ```

mod cleaner_hooks;
mod record_handler;

pub use cleaner_hooks::CleanerHooks;
pub use record_handler::RecordHookHandler;

use std::fmt;

use crate::Result;
use crate::models::MutatingRecord;

/// Lifecycle points the cleaner runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before a ticket is created.
    BeforeCreate,
    /// Before a followup is created.
    BeforeCreateFollowup,
    /// Before a ticket is updated.
    BeforeUpdate,
    /// Before a followup is updated.
    BeforeUpdateFollowup,
}

impl HookEvent {
    /// Every event.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::BeforeCreate,
            Self::BeforeCreateFollowup,
            Self::BeforeUpdate,
            Self::BeforeUpdateFollowup,
        ]
    }

    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeCreate => "before-create",
            Self::BeforeCreateFollowup => "before-create-followup",
            Self::BeforeUpdate => "before-update",
            Self::BeforeUpdateFollowup => "before-update-followup",
        }
    }

    /// Parses a kebab-case name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|event| event.as_str() == s)
    }

    /// True for creation events, the only ones that run attachment dedup.
    #[must_use]
    pub const fn is_create(self) -> bool {
        matches!(self, Self::BeforeCreate | Self::BeforeCreateFollowup)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callbacks the host invokes around record writes.
pub trait LifecycleHooks: Send + Sync {
    /// Before a ticket is created.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the hash registry is unavailable.
    fn on_before_create(&self, record: &MutatingRecord) -> Result<MutatingRecord>;

    /// Before a followup is created.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the hash registry is unavailable.
    fn on_before_create_followup(&self, record: &MutatingRecord) -> Result<MutatingRecord>;

    /// Before a ticket is updated.
    ///
    /// # Errors
    ///
    /// Implementations may return [`crate::Error::Storage`].
    fn on_before_update(&self, record: &MutatingRecord) -> Result<MutatingRecord>;

    /// Before a followup is updated.
    ///
    /// # Errors
    ///
    /// Implementations may return [`crate::Error::Storage`].
    fn on_before_update_followup(&self, record: &MutatingRecord) -> Result<MutatingRecord>;

    /// Routes `event` to the matching callback.
    ///
    /// # Errors
    ///
    /// Whatever the callback returns.
    fn dispatch(&self, event: HookEvent, record: &MutatingRecord) -> Result<MutatingRecord> {
        match event {
            HookEvent::BeforeCreate => self.on_before_create(record),
            HookEvent::BeforeCreateFollowup => self.on_before_create_followup(record),
            HookEvent::BeforeUpdate => self.on_before_update(record),
            HookEvent::BeforeUpdateFollowup => self.on_before_update_followup(record),
        }
    }
}

/// Trait for string-in, string-out hook handlers.
pub trait HookHandler: Send + Sync {
    /// The hook event type this handler processes.
    fn event_type(&self) -> &'static str;

    /// Handles the hook event.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or handling fails.
    fn handle(&self, input: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder;

    impl LifecycleHooks for Recorder {
        fn on_before_create(&self, record: &MutatingRecord) -> Result<MutatingRecord> {
            Ok(record.clone().with_name("create"))
        }

        fn on_before_create_followup(&self, record: &MutatingRecord) -> Result<MutatingRecord> {
            Ok(record.clone().with_name("create-followup"))
        }

        fn on_before_update(&self, record: &MutatingRecord) -> Result<MutatingRecord> {
            Ok(record.clone().with_name("update"))
        }

        fn on_before_update_followup(&self, record: &MutatingRecord) -> Result<MutatingRecord> {
            Ok(record.clone().with_name("update-followup"))
        }
    }

    #[test]
    fn test_event_names_round_trip() {
        for event in HookEvent::all() {
            assert_eq!(HookEvent::parse(event.as_str()), Some(event));
        }
        assert_eq!(HookEvent::parse("after-create"), None);
    }

    #[test]
    fn test_dispatch_routes_each_event() {
        let record = MutatingRecord::new();
        let names: Vec<_> = HookEvent::all()
            .into_iter()
            .map(|event| Recorder.dispatch(event, &record).unwrap().name.unwrap())
            .collect();
        assert_eq!(
            names,
            ["create", "create-followup", "update", "update-followup"]
        );
    }

    #[test]
    fn test_only_create_events_dedupe() {
        assert!(HookEvent::BeforeCreate.is_create());
        assert!(HookEvent::BeforeCreateFollowup.is_create());
        assert!(!HookEvent::BeforeUpdate.is_create());
        assert!(!HookEvent::BeforeUpdateFollowup.is_create());
    }
}
