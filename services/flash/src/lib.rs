//! Nier Flash Sale Service
//!
//! Persistence layer for produce "flash sale" offers and ethylene (ripeness)
//! sensor readings. Flash sale batches are stamped with a shared flash ID and
//! a timestamp, validated field by field, and inserted one record at a time.
//! Metric readings can be searched by a minimum ethylene level.
//!
//! ## Features
//!
//! - **Collection Provisioning**: one [`StoreHandle`] per collection, created
//!   against a pluggable document store and idempotent across restarts
//! - **Validated Batch Writes**: records are rejected before write on the
//!   first missing or out-of-range field; batches halt at the failing record
//! - **Ethylene Threshold Search**: `ethylene >= threshold` over the metric
//!   collection, backed by an expression index on PostgreSQL
//! - **HTTP API**: batch submission and threshold search endpoints
//!
//! ## Architecture
//!
//! ```text
//!   HTTP API                                     Document Store
//! ┌──────────────┐     ┌──────────────┐       ┌──────────────────┐
//! │ POST         │────▶│ Flash Sale   │──────▶│ flash            │
//! │ flash-sales  │     │ Writer       │       │                  │
//! └──────────────┘     └──────────────┘       │                  │
//!                            │ validate       │                  │
//!                            ▼                │                  │
//!                      ┌──────────────┐       │                  │
//!                      │ Validation   │       │                  │
//!                      └──────────────┘       │                  │
//! ┌──────────────┐     ┌──────────────┐       │                  │
//! │ GET metrics/ │────▶│ Metric       │──────▶│ metric           │
//! │ threshold    │     │ Reader       │       │                  │
//! └──────────────┘     └──────────────┘       │ inventory        │
//!                                             └──────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod handle;
pub mod identity;
pub mod model;
pub mod reader;
pub mod store;
pub mod validation;
pub mod writer;

pub use api::AppState;
pub use config::{Config, DbConfig};
pub use error::FlashError;
pub use handle::StoreHandle;
pub use identity::{IdGenerator, UuidV4Generator};
pub use model::{Document, Flash, Inventory, Metric, SchemaShape};
pub use reader::{EmptyResultPolicy, MetricReader};
pub use store::{
    CollectionRef, Connector, DocumentStore, Filter, InMemoryStore, InsertOneResult,
    PgConnector, StoreError,
};
pub use validation::{validate_flash, FlashField};
pub use writer::{BatchReceipt, FlashSaleWriter};
