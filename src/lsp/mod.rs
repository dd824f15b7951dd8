pub mod capabilities;
pub mod client;
pub mod connection;
pub mod error_types;
pub mod protocol;
mod response_router;
pub mod transport;

pub use capabilities::ServerCapabilities;
pub use client::{ClientOptions, LspClient};
pub use connection::StdioTransport;
pub use error_types::{ErrorCodes, ResponseError};
pub use transport::{RequestContext, Transport, TransportError};
