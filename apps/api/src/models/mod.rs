//! Library records, play queues, refresh events and request identity

pub mod context;
pub mod entity;
pub mod event;
pub mod library;
pub mod queue;
pub mod scrobble;
pub mod track;

pub use context::{Player, RequestContext, UserIdentity};
pub use entity::{AnnotatableEntity, EntityKind};
pub use event::{RefreshEvent, ResourceKind};
pub use library::{Album, Artist};
pub use queue::{PlayQueue, QueueField, QueueValidationError, CHANGED_BY_AUTO, MAX_QUEUE_SIZE};
pub use scrobble::Submission;
pub use track::Track;
