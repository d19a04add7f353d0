mod chooser;
mod format;
mod types;

pub use chooser::*;
pub use format::*;
pub use types::*;
