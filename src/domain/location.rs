use crate::domain::position::Range;
use serde::{Deserialize, Serialize};
use url::Url;

/// A span in a specific file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: Url,
    pub range: Range,
}

impl Location {
    pub fn new(uri: Url, range: Range) -> Self {
        Self { uri, range }
    }
}
