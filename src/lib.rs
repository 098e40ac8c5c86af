//! Write-through local caching for remote CRUD resources.
//!
//! A resource type's canonical store is a remote API; this crate keeps an
//! offline-capable mirror of it, keyed by server ids (`objectId`) and
//! client-generated ids (`localId`). Remote actions return live
//! [`ModelInstance`]s — arrays come wrapped in a [`Collection`] — and local
//! saves write the type's full record list through to a [`StoreAdapter`].
//!
//! # Example
//!
//! ```ignore
//! let resource = Resource::define(
//!   ResourceConfig::new("notes", "https://api.example.com/notes/:id"),
//!   Arc::new(HttpTransport::new()),
//!   Arc::new(SqliteStore::open()?),
//! )?;
//!
//! // Remote query, mirrored locally.
//! let notes = resource.query(Map::new()).await?;
//! resource.sync_to_local(&notes)?;
//!
//! // Offline: resolve and edit against the mirror.
//! if let Some(mut note) = resource.local_find_by_id(&json!(42)) {
//!   note.set("starred", true);
//!   note.save_local(None)?;
//! }
//! ```

pub mod collection;
pub mod index;
pub mod model;
pub mod record;
pub mod resource;
pub mod store;

pub use collection::{Collection, ValueKeyed};
pub use index::{RecordIndex, ResourceHooks};
pub use model::ModelInstance;
pub use record::AttributeRecord;
pub use resource::{
  ActionDef, ActionOutcome, ActionRequest, ActionResponse, BoxFuture, HttpTransport, Method,
  RemoteTransport, Resource, ResourceConfig, ResourceOptions, ResultShape,
};
pub use store::{MemoryStore, SqliteStore, StoreAdapter};
