#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod leader;
pub mod model;
pub mod query;
pub mod store;

pub use error::{Error, Result};
pub use leader::PolicyLeaders;
pub use model::{PolicyLeader, ServerMetadata};
pub use store::{Document, DocumentStore, InMemoryStore, RequestOpts, SearchHit};

/// Default collection holding one leadership record per policy.
pub const POLICIES_LEADER_INDEX: &str = ".fleet-policies-leaders";

/// Field the leadership lookup matches policy IDs against.
pub const FIELD_ID: &str = "_id";
