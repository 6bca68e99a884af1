//! Static per-provider, per-model price table.
//!
//! Prices are USD per 1000 tokens, split into input (prompt) and output
//! (completion). Pairs missing from the table are billed at
//! [`DEFAULT_PRICE`]. The same function prices both post-call usage and
//! pre-flight budget estimates.

/// Input and output price in USD per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (f64::from(input_tokens) / 1000.0) * self.input_per_1k
            + (f64::from(output_tokens) / 1000.0) * self.output_per_1k
    }
}

/// Flat rate for unknown provider/model pairs.
pub const DEFAULT_PRICE: ModelPrice = ModelPrice::new(0.002, 0.002);

const PRICES: &[(&str, &str, ModelPrice)] = &[
    ("azure", "gpt-4o", ModelPrice::new(0.005, 0.015)),
    ("azure", "gpt-4o-mini", ModelPrice::new(0.000_15, 0.000_6)),
    ("azure", "gpt-4", ModelPrice::new(0.03, 0.06)),
    ("azure", "gpt-4-turbo", ModelPrice::new(0.01, 0.03)),
    ("azure", "gpt-35-turbo", ModelPrice::new(0.000_5, 0.001_5)),
    ("bedrock", "claude-3-opus", ModelPrice::new(0.015, 0.075)),
    ("bedrock", "claude-3-5-sonnet", ModelPrice::new(0.003, 0.015)),
    ("bedrock", "claude-3-sonnet", ModelPrice::new(0.003, 0.015)),
    ("bedrock", "claude-3-haiku", ModelPrice::new(0.000_25, 0.001_25)),
];

/// Look up the price for a provider/model pair.
///
/// Model ids are matched by prefix after stripping a vendor namespace, so
/// `anthropic.claude-3-haiku-20240307-v1:0` prices as `claude-3-haiku`.
/// The longest matching prefix wins.
pub fn price_for(provider: &str, model: &str) -> ModelPrice {
    let bare = strip_vendor_namespace(model);
    PRICES
        .iter()
        .filter(|(p, m, _)| *p == provider && (bare == *m || bare.starts_with(&format!("{m}-"))))
        .max_by_key(|(_, m, _)| m.len())
        .map_or(DEFAULT_PRICE, |(_, _, price)| *price)
}

// "us.anthropic.claude-3-haiku-..." -> "claude-3-haiku-..."
fn strip_vendor_namespace(model: &str) -> &str {
    let mut rest = model;
    while let Some((ns, tail)) = rest.split_once('.') {
        if ns.is_empty() || !ns.chars().all(|c| c.is_ascii_alphabetic()) {
            break;
        }
        rest = tail;
    }
    rest
}

/// Cost in USD of a call with the given token counts.
pub fn calculate_cost(provider: &str, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    price_for(provider, model).cost(input_tokens, output_tokens)
}
