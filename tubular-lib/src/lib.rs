//! Tubular data grid library
//!
//! Headless grid and form controllers that talk to a paged JSON endpoint:
//! column definitions, sorting, filtering, paging, selection, row editing and
//! persistence of the grid state between sessions.

pub mod api;
pub mod auth;
pub mod error;
pub mod export;
pub mod form;
pub mod grid;
pub mod model;
pub mod server;
pub mod service;
pub mod storage;
pub mod validation;

pub use error::Error;
pub use form::FormController;
pub use grid::GridController;
pub use service::DataService;
pub use service::HttpDataService;
