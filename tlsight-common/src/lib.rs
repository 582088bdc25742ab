#![no_std]

#[cfg(any(test, feature = "fixtures"))]
extern crate alloc;

pub mod cursor;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod hello;
pub mod input;
pub mod record;

pub use cursor::{Cursor, ParseError};
pub use hello::{ServerHelloParse, parse_client_hello, parse_server_hello};
pub use input::{
    CaptureSource, ConnectionId, DecodedSegment, HandshakeKind, IPPROTO_TCP, SocketStateChange,
    TcpState, classify,
};
pub use record::{BirthRecord, ConnectionEvent, FourTuple, HandshakeEvent};
