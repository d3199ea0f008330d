use crate::config::app_config::SplitByTagsConfig;
use crate::domain::model::{Observation, TextualFactor};
use crate::factors::text::{observation_key, observation_tokens, rough_token_len, snake_case};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_TAG_PRIORITY: [&str; 16] = [
    "etf",
    "onchain",
    "derivatives",
    "orderbook",
    "tokenomics",
    "stablecoins",
    "protocol",
    "ecosystem",
    "liquidity",
    "narratives",
    "macro",
    "regulation",
    "cex",
    "dex",
    "sentiment",
    "news",
];

pub const DEFAULT_FALLBACK_TAG: &str = "misc";

#[derive(Debug, Clone, PartialEq)]
pub struct TagSplitConfig {
    pub enabled: bool,
    pub priority: Vec<String>,
    pub max_obs_per_factor: usize,
    pub max_tokens_factor: usize,
    pub fallback_tag: String,
}

impl Default for TagSplitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: DEFAULT_TAG_PRIORITY.iter().map(|t| t.to_string()).collect(),
            max_obs_per_factor: 7,
            max_tokens_factor: 4000,
            fallback_tag: DEFAULT_FALLBACK_TAG.to_string(),
        }
    }
}

impl From<&SplitByTagsConfig> for TagSplitConfig {
    fn from(cfg: &SplitByTagsConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            priority: cfg.priority.clone(),
            max_obs_per_factor: cfg.per_factor_limits.max_obs,
            max_tokens_factor: cfg.per_factor_limits.max_tokens_factor,
            fallback_tag: cfg.fallback_tag.clone(),
        }
    }
}

/// Splits one factor into single-tag factors. Every observation lands in at
/// most one bucket.
#[derive(Debug, Clone)]
pub struct TagSplitter {
    config: TagSplitConfig,
    priority_index: HashMap<String, usize>,
}

impl TagSplitter {
    pub fn new(config: TagSplitConfig) -> Self {
        let priority_index = config
            .priority
            .iter()
            .enumerate()
            .map(|(i, tag)| (snake_case(tag), i))
            .collect();
        Self {
            config,
            priority_index,
        }
    }

    pub fn config(&self) -> &TagSplitConfig {
        &self.config
    }

    /// Highest-priority tag; tags outside the priority list rank last and
    /// keep their input order among themselves.
    pub fn choose_primary_tag<S: AsRef<str>>(&self, tags: &[S]) -> Option<String> {
        let mut normalized: Vec<String> = tags
            .iter()
            .map(|t| snake_case(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        normalized.sort_by_key(|t| self.priority_index.get(t).copied().unwrap_or(usize::MAX));
        normalized.into_iter().next()
    }

    pub fn split(&self, factor: TextualFactor) -> Vec<TextualFactor> {
        if !self.config.enabled {
            tracing::info!("TagSplit disabled in config; returning original factor");
            return vec![factor];
        }

        tracing::info!(
            "TagSplit: factor by {}, obs={}",
            factor.agent_name,
            factor.observations.len()
        );

        let mut buckets: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        let mut bucket_tokens: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();

        for obs in &factor.observations {
            let key = observation_key(obs);
            if seen.contains(&key) {
                continue;
            }

            let tag = self
                .choose_primary_tag(&obs.tags)
                .unwrap_or_else(|| self.config.fallback_tag.clone());

            let bucket = buckets.entry(tag.clone()).or_default();
            let current = bucket_tokens.entry(tag).or_insert(0);
            let candidate = rough_token_len(&[obs.text.as_str()]);

            if bucket.len() < self.config.max_obs_per_factor
                && *current + candidate <= self.config.max_tokens_factor
            {
                bucket.push(obs.clone());
                *current += candidate;
                seen.insert(key);
            }
        }

        let mut out: Vec<TextualFactor> = buckets
            .into_iter()
            .filter(|(_, observations)| !observations.is_empty())
            .map(|(tag, observations)| {
                let length_tokens = observation_tokens(&observations);
                let split = TextualFactor {
                    date: factor.date,
                    agent_name: format!("{}#{}", factor.agent_name, tag),
                    observations,
                    length_tokens,
                    preference: Some(tag),
                    raw_sources: factor.raw_sources.clone(),
                };
                tracing::info!(
                    "TagSplit: built {} obs={} tokens≈{}",
                    split.agent_name,
                    split.observations.len(),
                    split.length_tokens
                );
                split
            })
            .collect();

        out.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));
        out
    }
}

/// One-off primary tag lookup against an explicit (or the default) priority.
pub fn choose_primary_tag<S: AsRef<str>>(tags: &[S], priority: Option<&[String]>) -> Option<String> {
    let config = TagSplitConfig {
        priority: priority
            .map(|p| p.to_vec())
            .unwrap_or_else(|| TagSplitConfig::default().priority),
        ..TagSplitConfig::default()
    };
    TagSplitter::new(config).choose_primary_tag(tags)
}

pub fn split_factor_by_tags(factor: TextualFactor, config: TagSplitConfig) -> Vec<TextualFactor> {
    TagSplitter::new(config).split(factor)
}
