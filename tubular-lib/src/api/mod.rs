//! Wire shapes exchanged with data endpoints

mod request;
mod response;

pub use request::*;
pub use response::*;
