mod api;
mod logging;

pub use api::*;
pub use logging::*;
