mod packet;
mod command;
mod data;
pub mod constants;

pub use packet::*;
pub use command::*;
pub use data::*;
pub use constants::*;
