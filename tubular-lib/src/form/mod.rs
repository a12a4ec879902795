//! Single-record form controller

mod controller;
mod events;

pub use controller::*;
pub use events::*;
