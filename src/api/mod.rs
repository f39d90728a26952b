pub mod catalog;
pub mod import;

pub use catalog::*;
pub use import::*;
