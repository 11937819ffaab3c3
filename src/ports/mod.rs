pub mod traits;
pub mod memory;
pub mod observer;

pub use traits::{LeaseSource, RelationshipStore, SyncObserver, PageRequest};
pub use memory::{InMemoryLeaseSource, InMemoryRelationshipStore, EdgeWrite, WriteOp};
pub use observer::{NoopObserver, TracingObserver, RecordingObserver, ObservedEvent, ObservedLevel};
