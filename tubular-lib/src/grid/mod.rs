//! Grid controller and its state

mod columns;
mod controller;
mod events;
mod options;
mod selection;
mod state;

pub use controller::*;
pub(crate) use controller::div_ceil;
pub use events::*;
pub use options::*;
pub use state::*;
