pub mod coordinates;
pub mod store;

mod model;

// Re-export main types
pub use coordinates::{LineIndex, PositionEncoding, compute_line_starts};
pub use model::{Document, SymbolTable, build_symbol_table};
pub use store::{DocumentStore, read_source};
