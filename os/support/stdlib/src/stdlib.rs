#[macro_use]
pub mod fmt;
pub mod io;
