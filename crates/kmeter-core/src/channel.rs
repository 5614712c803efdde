//! Positional channel roles and their BS.1770 mean-square weights.

/// Positional channel role, indexed `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    L,
    R,
    C,
    Lfe,
    Ls,
    Rs,
}

impl ChannelRole {
    /// Map a channel index (`0..=5`) to its positional role. Indices beyond
    /// 5 have no defined role and weight 0.0 in BS.1770 summation.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::L),
            1 => Some(Self::R),
            2 => Some(Self::C),
            3 => Some(Self::Lfe),
            4 => Some(Self::Ls),
            5 => Some(Self::Rs),
            _ => None,
        }
    }

    /// BS.1770 mean-square summation weight for this role.
    ///
    /// L = R = C = 1.0, LFE = 0.0 (skipped entirely), Ls = Rs = √2.
    pub fn bs1770_weight(self) -> f64 {
        match self {
            Self::L | Self::R | Self::C => 1.0,
            Self::Lfe => 0.0,
            Self::Ls | Self::Rs => std::f64::consts::SQRT_2,
        }
    }
}

/// BS.1770 mean-square weight for a raw channel index, 0.0 for any index
/// without a defined role (including LFE and anything beyond index 5).
pub fn bs1770_weight_for_index(index: usize) -> f64 {
    ChannelRole::from_index(index).map_or(0.0, ChannelRole::bs1770_weight)
}
