//! Categories of services priced across named ranges ("headers").
//!
//! A category owns its headers and services; `service_attributes` holds the
//! sparse (service, header) -> price matrix keyed by that pair.

mod read;
mod service;
mod write;

pub use read::{fetch_tables, CategoryTable};
pub use service::{add_service, delete_service, update_service_prices};
pub use write::{add_table, NewTable};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A 1-based request index that does not point at anything created in the same request.
    #[error("{field} {index} is out of range (1..={len})")]
    InvalidIndex {
        field: &'static str,
        index: usize,
        len: usize,
    },
    #[error("service {0} does not exist")]
    ServiceNotFound(i32),
    #[error("category {0} does not exist")]
    CategoryNotFound(i32),
    #[error("no price found for service {service_id} and header {header_id}")]
    CellNotFound { service_id: i32, header_id: i32 },
    #[error("header {header_id} does not belong to category {category_id}")]
    HeaderNotInCategory { header_id: i32, category_id: i32 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
