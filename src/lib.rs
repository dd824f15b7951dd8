pub mod analysis;
pub mod config;
pub mod document;
pub mod domain;
pub mod error;
pub mod lsp;

pub use config::{ClientConfig, ConfigError};
pub use domain::{Location, Position, Range, Symbol, SymbolNode, Token, TokenLegend};
pub use error::{ClientError, ClientResult};
pub use lsp::{ClientOptions, LspClient, RequestContext, StdioTransport, Transport};
