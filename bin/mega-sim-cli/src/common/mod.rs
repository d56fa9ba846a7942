mod chain;
mod error;
mod logging;
mod request;
mod state;

pub use chain::*;
pub use error::*;
pub use logging::*;
pub use request::*;
pub use state::*;
