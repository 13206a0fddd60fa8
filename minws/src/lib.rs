//! # NOT FOR PRODUCTION USE
//! A minimal server side websocket implementation (RFC 6455) over blocking
//! std streams. No fragmentation, no extensions and no TLS.

pub mod consts;
pub mod http;
pub mod websocket;

mod error;
mod server;

#[cfg(test)]
mod testing;

pub use error::Error;
pub use http::{HttpRequest, HttpResponse};
pub use server::{Handler, Server, ServerConfig};
pub use websocket::{Connection, ConnectionState, DataFrame, OpCode, WsConfig};
