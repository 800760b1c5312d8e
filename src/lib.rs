//! Paginated remote-resource stores for the restaurant back-office API.
//!
//! One [`store::ResourceStore`] per entity, configured by a
//! [`descriptor::ResourceDescriptor`] from [`catalog`], talking to the server
//! through a [`client::Transport`].

pub mod catalog;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod entities;
pub mod error;
pub mod model;
pub mod store;

pub use client::{ApiRequest, ApiResponse, RestClient, Transport};
pub use descriptor::{ReferenceKind, ResourceDescriptor, SortSpec};
pub use error::{Operation, StoreError};
pub use model::{PageState, Record, ReferenceItem, Resource, SortOrder, SortState};
pub use store::{ResourceStore, StoreSettings};
