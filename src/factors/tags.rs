use crate::factors::text::snake_case;
use std::collections::HashSet;

pub const CANON_TAGS: [&str; 15] = [
    "macro",
    "regulation",
    "etf",
    "onchain",
    "derivatives",
    "orderbook",
    "sentiment",
    "tokenomics",
    "stablecoins",
    "ecosystem",
    "protocol",
    "narratives",
    "cex",
    "dex",
    "liquidity",
];

pub const DEFAULT_MAX_TAGS: usize = 3;

/// Keyword rules used only when the model returned no usable tags.
/// Order matters: it is the order the derived tags are emitted in.
const KEYWORD_RULES: &[(&str, &[&str])] = &[
    ("macro", &["cpi", "fed", "yield", "rates", "inflation", "macro"]),
    ("etf", &["etf", "blackrock", "fidelity", "inflows", "outflows"]),
    ("onchain", &["on-chain", "onchain", "addresses", "tvl", "bridge", "staking"]),
    (
        "derivatives",
        &["funding", "perp", "perps", "basis", "oi", "open interest", "liquidations"],
    ),
    (
        "orderbook",
        &["orderbook", "order book", "bid wall", "ask wall", "liquidity wall", "depth"],
    ),
    ("tokenomics", &["unlock", "emission", "halving", "supply schedule"]),
    ("stablecoins", &["stablecoin", "usdt", "usdc", "stable flow"]),
    ("dex", &["dex", "amm", "lp", "pool"]),
    ("cex", &["cex", "binance", "bybit", "okx", "kraken", "coinbase"]),
    ("narratives", &["narrative", "sector rotation", "theme"]),
];

/// Maps a snake_cased tag onto its canonical name, leaving unknown tags alone.
pub fn canonical_tag(tag: &str) -> &str {
    match tag {
        "macro_economy" | "macro_economic" | "rates" | "cpi" | "fed" | "yields" => "macro",
        "regulatory" | "policy" | "sec" => "regulation",
        "etf_flows" | "spot_etf" | "futures_etf" => "etf",
        "on_chain" | "chain" | "addresses" | "tvl" => "onchain",
        "perps" | "funding" | "open_interest" | "basis" | "liquidations" => "derivatives",
        "order_flow" | "book" | "depth" => "orderbook",
        "newsflow" | "social" | "tone" => "sentiment",
        "unlock" | "emission" | "halving" => "tokenomics",
        "stables" | "usdt" | "usdc" => "stablecoins",
        "dev_activity" | "revenue" | "fee" => "protocol",
        "l2" => "ecosystem",
        "sector_rotation" => "narratives",
        "centralized_exchange" => "cex",
        "decentralized_exchange" => "dex",
        "market_liquidity" | "depth_liquidity" => "liquidity",
        other => other,
    }
}

pub fn is_canonical(tag: &str) -> bool {
    CANON_TAGS.contains(&tag)
}

/// Snake-cases and canonicalizes model tags, falling back to keyword
/// heuristics over `text` when none survive. At most `max_tags` are kept.
pub fn normalize_tags<S: AsRef<str>>(raw_tags: &[S], text: &str, max_tags: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for raw in raw_tags {
        let snake = snake_case(raw.as_ref());
        if snake.is_empty() {
            continue;
        }
        let tag = canonical_tag(&snake).to_string();
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }

    if out.is_empty() {
        let lowered = text.to_lowercase();
        for (tag, keywords) in KEYWORD_RULES {
            if keywords.iter().any(|k| lowered.contains(k)) && seen.insert(tag.to_string()) {
                out.push(tag.to_string());
            }
        }
    }

    out.truncate(max_tags);

    for tag in out.iter().filter(|t| !is_canonical(t)) {
        tracing::info!("Tags: detected NEW/NON-CANON tag: {}", tag);
    }

    out
}
