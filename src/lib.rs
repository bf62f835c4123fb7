//! # brtrecover
//!
//! Crash recovery for a fractal-tree ("BRT") storage engine:
//! - Replays write-ahead log segments against tree files, in order
//! - Rebuilds leaf and internal nodes exactly, fingerprints included
//! - All-or-nothing: any damaged or inconsistent record aborts the run
//! - Guards the data directory with an advisory lock
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Recovery Driver                          │
//! │        (lock, temp-file sweep, segment discovery)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        WAL Reader ──▶ RecoveryContext::apply                │
//! │                   (one handler per record kind)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ File Table  │          │ Page Cache  │
//!   │(TreeHandle) │          │ (TreeNode)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ evict / close file
//!                                   ▼
//!                           ┌─────────────┐
//!                           │  Staging    │
//!                           │ (scratch)   │
//!                           └──────┬──────┘
//!                                  │ close() after the last record
//!                                  ▼
//!                           ┌─────────────┐
//!                           │ Tree Files  │
//!                           │  (blocks)   │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod brt;
pub mod cachetable;
pub mod recovery;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RecoveryError, Result};
pub use config::RecoveryConfig;
pub use recovery::{Recovery, RecoveryContext, RecoveryResult};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of brtrecover
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
