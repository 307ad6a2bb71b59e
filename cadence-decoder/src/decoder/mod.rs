//! Decoder thread, its control block, and the API handed to plugins

pub mod api;
pub mod control;
pub mod mapper;
pub mod reader;
mod session;
pub mod worker;

pub use api::Decoder;
pub use control::{ControlState, DecodeCommand, DecodeState, DecoderControl};
pub use mapper::{MusicDirectoryMapper, UriMapper};
pub use reader::DecoderReader;
pub use worker::DecoderWorker;
