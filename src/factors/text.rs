use crate::domain::model::Observation;
use regex::Regex;
use std::sync::LazyLock;

/// Tickers the agent knows about; anything else is reported as a new symbol.
pub const KNOWN_ASSETS: [&str; 5] = ["BTC", "ETH", "SOL", "BNB", "TON"];

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

static SYMBOL_MAP: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\bbitcoin\b|\bbtc\b", "BTC"),
        (r"\beth(er|ereum)?\b", "ETH"),
        (r"\bsolana\b|\bsol\b", "SOL"),
        (r"\bbnb\b", "BNB"),
        (r"\bton\b|\btoncoin\b", "TON"),
    ]
    .into_iter()
    .map(|(pattern, symbol)| (Regex::new(pattern).expect("valid regex"), symbol))
    .collect()
});

/// Lowercase snake_case: `"On-Chain  Flows"` → `"on_chain_flows"`.
pub fn snake_case(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Cheap token estimate: whitespace words × 1.3, truncated.
pub fn rough_token_len<S: AsRef<str>>(texts: &[S]) -> usize {
    let words: usize = texts
        .iter()
        .map(|t| t.as_ref().split_whitespace().count())
        .sum();
    words * 13 / 10
}

pub fn observation_tokens(observations: &[Observation]) -> usize {
    observations
        .iter()
        .map(|o| rough_token_len(&[o.text.as_str()]))
        .sum()
}

/// Global dedup key `ASSET|normalized text`.
pub fn observation_key(obs: &Observation) -> String {
    let text = obs
        .text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let asset = obs.asset.as_deref().unwrap_or("NA").to_uppercase();
    format!("{}|{}", asset, text)
}

pub fn guess_asset(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    SYMBOL_MAP
        .iter()
        .find(|(re, _)| re.is_match(&lowered))
        .map(|(_, symbol)| symbol.to_string())
}

pub fn is_known_asset(asset: &str) -> bool {
    KNOWN_ASSETS.contains(&asset)
}
