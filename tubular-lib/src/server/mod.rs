//! Server-side counterpart of the grid protocol.
//!
//! [`GridDataSource`] applies search, filters, sorting, paging and aggregates
//! to a record set the way a grid endpoint does. [`InMemoryDataService`]
//! serves such sources to controllers without a network.

mod memory;
mod source;

pub use memory::InMemoryDataService;
pub use source::GridDataSource;
