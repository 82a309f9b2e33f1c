mod actions;
mod document;
mod inventory;
mod topology;

pub use actions::*;
pub use document::*;
pub use inventory::*;
pub use topology::*;
