pub mod cli;
pub mod events;
pub mod io;
pub mod logging;
pub mod model;
pub mod ops;
pub mod store;
pub mod timer;
