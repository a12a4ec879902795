//! Column and row models

mod column;
mod filter;
mod row;
mod search;
pub mod value;

pub use column::*;
pub use filter::*;
pub use row::*;
pub use search::*;
