mod database;
mod driver;

pub use database::*;
pub use driver::*;
