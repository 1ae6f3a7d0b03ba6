pub mod flv;
pub mod rtmp;
