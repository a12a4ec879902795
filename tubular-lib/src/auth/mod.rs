//! Authentication

pub(crate) mod common;
pub(crate) mod exchange;
mod session;

pub use common::TokenResponse;
pub use session::AUTH_DATA_KEY;
pub use session::SessionContext;
pub use session::SessionEvent;
pub use session::UserData;
