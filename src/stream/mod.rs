mod classify;
mod gop_cache;
mod packet;
mod publisher;

pub use classify::*;
pub use gop_cache::*;
pub use packet::*;
pub use publisher::*;
