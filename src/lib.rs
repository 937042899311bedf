//! Native-messaging host for a user-styles browser extension.
//!
//! Watches a fixed directory for `.css` files and streams
//! `created`/`modified`/`deleted`/`renamed` messages to the extension over
//! stdout, framed the way browsers expect from a native host.
//!
//! ```text
//! notify ──► watcher (rename pairing) ──► translate ──► wire ──► stdout
//!                                            │
//!                                 classify ◄─┴─► scanner
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod host;
pub mod manifest;
pub mod message;
pub mod scanner;
pub mod translate;
pub mod watcher;
pub mod wire;

pub use classify::WatchRoot;
pub use error::{HostError, Result};
pub use message::Message;
