use crate::models::QueryShape;

/// Fallback stages available to a query shape beyond the stale cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FallbackPlan {
    /// Ask the next provider in the chain.
    pub secondary: bool,
    /// Serve the last value ever observed for the feed.
    pub last_known: bool,
    /// Generate placeholder chart data.
    pub synthetic: bool,
}

impl FallbackPlan {
    /// | shape | secondary | last-known | synthetic |
    /// |---|---|---|---|
    /// | history / ohlc | no | no | yes |
    /// | detail, market list, batch quote, global | yes | no | no |
    /// | fear & greed | no | yes | no |
    /// | trending | no | no | no |
    pub fn for_shape(shape: &QueryShape) -> Self {
        match shape {
            QueryShape::History(_) | QueryShape::Ohlc(_) => Self {
                secondary: false,
                last_known: false,
                synthetic: true,
            },
            QueryShape::Detail
            | QueryShape::MarketList { .. }
            | QueryShape::BatchQuote
            | QueryShape::GlobalMarket => Self {
                secondary: true,
                last_known: false,
                synthetic: false,
            },
            QueryShape::FearGreed => Self {
                secondary: false,
                last_known: true,
                synthetic: false,
            },
            QueryShape::Trending => Self {
                secondary: false,
                last_known: false,
                synthetic: false,
            },
        }
    }
}
