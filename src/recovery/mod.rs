//! Recovery Module
//!
//! Replays log segments against the tree files in a data directory.
//!
//! ## Flow
//! ```text
//!   RecoveryLock::acquire(data_dir)
//!         │
//!   delete __rolltmp.* ──▶ find_log_segments(log_dir)
//!         │
//!   RecoveryContext ◀── LogReader::next_entry() per segment
//!         │                 apply(entry)
//!         ▼
//!   close(): tree headers, dirty nodes, files ──▶ staged blocks promoted
//! ```
//!
//! All state for one run lives in a `RecoveryContext`; there are no globals.

mod context;
mod dispatch;
mod driver;
mod files;
mod lock;

pub use context::RecoveryContext;
pub use driver::{replay_segment, Recovery, RecoveryResult};
pub use files::{FileEntry, FileTable};
pub use lock::{RecoveryLock, LOCK_FILE_NAME};
