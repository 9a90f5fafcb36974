//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Change feed and metadata lookups (Google Drive)
//! - [`ICursorStore`] - Persistent storage for the change-feed cursor
//! - [`INotificationSink`] - Delivery of classified events

pub mod cursor_store;
pub mod notification;
pub mod remote_store;

pub use cursor_store::ICursorStore;
pub use notification::INotificationSink;
pub use remote_store::{IRemoteStore, RemoteStoreError};
