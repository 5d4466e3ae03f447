//! Session subsystem
//!
//! Audio focus, wake-lock and foreground-service coordination, run on a
//! dedicated control thread.
//!

pub mod coordinator;
pub mod engine;
pub mod platform;
pub mod types;
pub mod wake_lock;

pub use coordinator::SessionCoordinator;
pub use engine::{BridgeEngine, OsEvents};
pub use platform::{AudioPlatform, MediaCommand};
pub use types::{
    Advisory, AdvisorySource, BridgeCommand, BridgeEvent, CoordinatorState, FocusChange, OsEvent,
    SessionSnapshot, SessionState,
};
pub use wake_lock::WakeLock;
