pub mod events;
pub mod queue;
pub mod remote;

pub use events::{SyncEvent, SyncEventKind, SyncEvents};
pub use queue::{QueueItem, RemoteOperation, RetryQueue};
pub use remote::{HttpRemoteStore, RemoteDeckStore, RemoteError};
