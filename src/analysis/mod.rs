pub mod range;
pub mod semantic;
pub mod symbols;

// Re-export main types and functions
pub use range::filter_tokens_by_range;
pub use semantic::{AbsoluteToken, TOKEN_STRIDE, decode_positions, decode_tokens};
pub use symbols::{build_symbol_hierarchy, find_enclosing_symbol};
