pub mod consts;

mod config;
mod connection;
mod error;
mod frame;
mod opcode;

pub use config::WsConfig;
pub use connection::{Connection, ConnectionState, Transport};
pub use error::{Error, FrameError, FrameSection};
pub use frame::{apply_mask, DataFrame};
pub use opcode::OpCode;
