
mod stream;
mod reader;
mod writer;

pub use stream::*;
pub use reader::*;
pub use writer::*;