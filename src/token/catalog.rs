//! Static per-model context-window and pricing table.
//!
//! Unknown model ids fall back to the `"default"` entry, grounded on
//! `config/schema.rs`'s `ProviderConfig` default-id/default-model pattern.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub display_name: &'static str,
    pub context_limit: u32,
}

pub struct ModelCatalog {
    models: HashMap<&'static str, ModelPricing>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "default",
            ModelPricing { input_per_million: 3.0, output_per_million: 15.0, display_name: "default", context_limit: 100_000 },
        );
        models.insert(
            "gpt-4o",
            ModelPricing { input_per_million: 2.5, output_per_million: 10.0, display_name: "GPT-4o", context_limit: 128_000 },
        );
        models.insert(
            "gpt-4o-mini",
            ModelPricing { input_per_million: 0.15, output_per_million: 0.6, display_name: "GPT-4o mini", context_limit: 128_000 },
        );
        models.insert(
            "claude-sonnet-4.5",
            ModelPricing { input_per_million: 3.0, output_per_million: 15.0, display_name: "Claude Sonnet 4.5", context_limit: 200_000 },
        );
        models.insert(
            "claude-haiku",
            ModelPricing { input_per_million: 0.8, output_per_million: 4.0, display_name: "Claude Haiku", context_limit: 200_000 },
        );
        Self { models }
    }

    fn lookup(&self, model: &str) -> ModelPricing {
        *self.models.get(model).unwrap_or_else(|| &self.models["default"])
    }

    pub fn model_limit(&self, model: &str) -> u32 {
        self.lookup(model).context_limit
    }

    pub fn model_pricing(&self, model: &str) -> ModelPricing {
        self.lookup(model)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_resolves() {
        let cat = ModelCatalog::new();
        assert_eq!(cat.model_limit("gpt-4o"), 128_000);
    }

    #[test]
    fn unknown_model_falls_back_to_default() {
        let cat = ModelCatalog::new();
        let default_limit = cat.model_limit("default");
        assert_eq!(cat.model_limit("no-such-model-xyz"), default_limit);
    }
}
