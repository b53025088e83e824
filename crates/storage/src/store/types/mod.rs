#![forbid(unsafe_code)]

mod changes;
mod events;
mod revisions;
mod rows;
mod tables;

pub use changes::*;
pub use events::*;
pub use revisions::*;
pub use rows::*;
pub use tables::*;
