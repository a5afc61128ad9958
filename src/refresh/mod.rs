pub mod scheduler;
pub mod store;

pub use scheduler::{subscribe, Subscription};
pub use store::{Snapshot, SnapshotStore};
