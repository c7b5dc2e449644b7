//! Canonical ids for well-known ticker symbols.
//!
//! Many tokens reuse popular tickers; these mappings pick the asset people
//! mean when they type the ticker.

use std::collections::HashMap;

use lazy_static::lazy_static;

const WELL_KNOWN: &[(&str, &str)] = &[
    ("btc", "bitcoin"),
    ("eth", "ethereum"),
    ("usdt", "tether"),
    ("bnb", "binancecoin"),
    ("sol", "solana"),
    ("xrp", "ripple"),
    ("usdc", "usd-coin"),
    ("ada", "cardano"),
    ("doge", "dogecoin"),
    ("trx", "tron"),
    ("ton", "the-open-network"),
    ("dot", "polkadot"),
    ("matic", "matic-network"),
    ("pol", "polygon-ecosystem-token"),
    ("ltc", "litecoin"),
    ("link", "chainlink"),
    ("avax", "avalanche-2"),
    ("shib", "shiba-inu"),
    ("atom", "cosmos"),
    ("xlm", "stellar"),
    ("uni", "uniswap"),
    ("bch", "bitcoin-cash"),
    ("near", "near"),
    ("apt", "aptos"),
    ("arb", "arbitrum"),
    ("op", "optimism"),
    ("sui", "sui"),
    ("pepe", "pepe"),
    ("dai", "dai"),
    ("xmr", "monero"),
    ("etc", "ethereum-classic"),
    ("fil", "filecoin"),
    ("icp", "internet-computer"),
    ("hbar", "hedera-hashgraph"),
    ("inj", "injective-protocol"),
];

lazy_static! {
    static ref BY_SYMBOL: HashMap<&'static str, &'static str> =
        WELL_KNOWN.iter().copied().collect();
}

/// Canonical id for a ticker, if it is in the table.
pub fn canonical_id(symbol: &str) -> Option<&'static str> {
    BY_SYMBOL.get(symbol.trim().to_lowercase().as_str()).copied()
}
