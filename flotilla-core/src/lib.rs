mod action;
mod cluster;
mod config;
mod database;
mod driver;
mod queue;
mod queue_list;
mod signal;
mod util;
pub mod wait;

pub use ::anyhow::Context;
pub use action::*;
pub use cluster::*;
pub use config::*;
pub use database::*;
pub use driver::*;
pub use queue::*;
pub use queue_list::*;
#[doc(hidden)]
pub use util::floor_char_boundary;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
