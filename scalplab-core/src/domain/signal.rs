//! Per-bar entry signal tag.

use serde::{Deserialize, Serialize};

use super::position::Side;

/// Entry trigger attached to a single bar.
///
/// Produced once per bar and never revised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    #[default]
    None,
    Long,
    Short,
}

impl Signal {
    pub fn is_entry(self) -> bool {
        self != Self::None
    }

    /// Position side this signal would open, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Self::None => None,
            Self::Long => Some(Side::Long),
            Self::Short => Some(Side::Short),
        }
    }
}
