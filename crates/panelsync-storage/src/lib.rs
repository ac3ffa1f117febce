//! # panelsync-storage
//!
//! Filesystem primitives shared by both sides of the hot folder handoff:
//! stability detection, atomic publication, format soft-validation, naming
//! rules, hashing, the artifact publisher, the file-backed job queue, a
//! notify-backed folder watcher and an offset-based log follower.

pub mod atomic;
pub mod follow;
pub mod hash;
pub mod hot_folders;
pub mod latest;
pub mod naming;
pub mod publish;
pub mod queue;
pub mod stability;
pub mod validate;
pub mod watch;

pub use atomic::write_atomic;
pub use follow::{LogFollower, LogHighlight};
pub use hot_folders::HotFolderSet;
pub use publish::ArtifactPublisher;
pub use queue::JobQueue;
pub use stability::wait_until_stable;
pub use validate::{soft_validate, ValidationReport};
pub use watch::{FolderEvent, FolderWatcher};
