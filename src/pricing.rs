use std::collections::HashMap;

/// Model used to price completions whose model has no row of its own.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Per-model rates in USD micros per one million tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelPricing {
    pub input_usd_micros_per_million: u64,
    pub output_usd_micros_per_million: u64,
}

#[derive(Clone, Debug)]
pub struct PricingTable {
    models: HashMap<&'static str, ModelPricing>,
}

const fn per_million(usd_cents: u64) -> u64 {
    usd_cents * 10_000
}

/// (model, input USD cents per million tokens, output USD cents per million tokens)
const BUILTIN_RATES: &[(&str, u64, u64)] = &[
    ("gpt-4o", 250, 1_000),
    ("gpt-4o-mini", 15, 60),
    ("o1", 1_500, 6_000),
    ("o3-mini", 110, 440),
    ("gpt-3.5-turbo", 50, 150),
    ("claude-sonnet-4-20250514", 300, 1_500),
    ("claude-opus-4-20250514", 1_500, 7_500),
    ("claude-3-5-haiku-20241022", 80, 400),
    ("gemini-2.0-flash", 10, 40),
    ("gemini-1.5-pro", 125, 500),
    ("mistral-large-latest", 200, 600),
    ("mistral-small-latest", 20, 60),
    ("meta-llama/Llama-3.3-70B-Instruct-Turbo", 88, 88),
];

impl PricingTable {
    pub fn builtin() -> Self {
        let models = BUILTIN_RATES
            .iter()
            .map(|&(model, input_cents, output_cents)| {
                (
                    model,
                    ModelPricing {
                        input_usd_micros_per_million: per_million(input_cents),
                        output_usd_micros_per_million: per_million(output_cents),
                    },
                )
            })
            .collect();
        Self { models }
    }

    /// Pricing row for a model, falling back to [`DEFAULT_MODEL`].
    pub fn model_pricing(&self, model: &str) -> ModelPricing {
        self.models
            .get(model)
            .or_else(|| self.models.get(DEFAULT_MODEL))
            .copied()
            .expect("default model row is always present")
    }

    /// Cost of one completion in USD micros. Ceil-division so sub-micro
    /// remainders round against the caller, never against the ledger.
    pub fn cost_usd_micros(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> u64 {
        let pricing = self.model_pricing(model);
        let total = u128::from(prompt_tokens) * u128::from(pricing.input_usd_micros_per_million)
            + u128::from(completion_tokens) * u128::from(pricing.output_usd_micros_per_million);
        total.div_ceil(1_000_000) as u64
    }

    /// Models with an explicit pricing row, in table order.
    pub fn models(&self) -> impl Iterator<Item = (&'static str, ModelPricing)> + '_ {
        BUILTIN_RATES
            .iter()
            .map(|&(model, _, _)| (model, self.model_pricing(model)))
    }
}
