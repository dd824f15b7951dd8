pub mod location;
pub mod position;
pub mod semantic;
pub mod symbol;

pub use location::Location;
pub use position::{Position, Range, RangeEnd, TokenWindow};
pub use semantic::{Token, TokenLegend};
pub use symbol::{Symbol, SymbolNode};
