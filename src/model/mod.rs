pub mod item;
pub mod list;
pub mod recap;
pub mod config;

pub use item::*;
pub use list::*;
pub use recap::*;
pub use config::*;
