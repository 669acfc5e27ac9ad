//! Worker session lifecycle and operator notifications.
//!
//! Holds the status vocabularies, the transition tables that guard them,
//! the registry mirroring the external session pool, and the notification
//! aggregator fed by accepted transitions.

mod machine;
mod notifications;
mod registry;
mod status;

pub use machine::{
    is_valid_spec_transition, is_valid_worker_transition, validate_spec_transition,
    validate_transition, validate_worker_transition, StateMachine, TransitionError,
};
pub use notifications::{Notification, NotificationAggregator, NotificationKind};
pub use registry::{RegistryError, RegistryResult, SessionEvent, SessionRegistry, WorkerSession};
pub use status::{SessionStatus, SpecStatus};
