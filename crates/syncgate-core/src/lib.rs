//! # Syncgate Core
//!
//! Tenant-scoped object operations on top of an [`ObjectStore`].
//!
//! This crate provides:
//! - **Prefix translation**: relative keys to absolute storage keys, never
//!   escaping the caller's root
//! - **Object operations**: stat, presign, delete with tombstones, list
//! - **Change feed**: polling subscriptions that report changes and deletes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           HTTP API (syncgate-cli)       │
//! ├─────────────────────────────────────────┤
//! │   ObjectService     │    ChangeFeed     │
//! ├─────────────────────────────────────────┤
//! │   Prefix translation (UserContext)      │
//! ├─────────────────────────────────────────┤
//! │           ObjectStore                   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! [`ObjectStore`]: syncgate_store::ObjectStore

pub mod context;
pub mod error;
pub mod feed;
pub mod objects;
pub mod prefix;
pub mod tombstone;

pub use context::{AuthMode, KeyScope, UserContext};
pub use error::{CoreError, Result};
pub use feed::{ChangeEvent, ChangeFeed, ChangeKind, FeedConfig, FeedState, SubscribeRequest, Subscription};
pub use objects::{
    DeletePrefixResult, DeleteResult, ListPage, ListedObject, ObjectService, PresignPolicy,
    MAX_PRESIGN_EXPIRY,
    PresignedItem, PresignedUrl, ServiceConfig, StatResult, UploadItem,
};
pub use prefix::{resolve_key, resolve_prefix, ScopeError};
pub use tombstone::Tombstone;
