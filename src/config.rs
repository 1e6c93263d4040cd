use serde::Deserialize;

use validation_engine::{CostModel, ValidationConfig};
use web_client::WebClientConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub web: WebClientConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    #[serde(default)]
    pub cost_model: CostModel,
    #[serde(default = "default_per_item_ceiling")]
    pub per_item_ceiling_usd: f64,
    #[serde(default = "default_per_batch_ceiling")]
    pub per_batch_ceiling_usd: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            cost_model: CostModel::default(),
            per_item_ceiling_usd: default_per_item_ceiling(),
            per_batch_ceiling_usd: default_per_batch_ceiling(),
        }
    }
}

fn default_per_item_ceiling() -> f64 {
    0.50
}

fn default_per_batch_ceiling() -> f64 {
    5.00
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "opportunities.db".into()
}

impl AppConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Invalid configuration is fatal to the batch, so fail here rather
    /// than mid-run.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.budget.per_item_ceiling_usd < 0.0 || self.budget.per_batch_ceiling_usd < 0.0 {
            anyhow::bail!("budget ceilings must be non-negative");
        }
        if !(0.0..=100.0).contains(&self.validation.validation_threshold) {
            anyhow::bail!(
                "validation.validation_threshold must be in [0,100], got {}",
                self.validation.validation_threshold
            );
        }
        if self.web.requests_per_window == 0 {
            anyhow::bail!("web.requests_per_window must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let raw = r#"
            [llm]
            provider = "anthropic"
            model = "claude-sonnet-4-20250514"
            timeout_ms = 30000
            max_retries = 3
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.validation.validation_threshold, 60.0);
        assert_eq!(config.budget.per_batch_ceiling_usd, 5.0);
    }

    #[test]
    fn negative_budget_fails_validation() {
        let raw = r#"
            [llm]
            provider = "anthropic"
            model = "m"
            timeout_ms = 1000
            max_retries = 1

            [budget]
            per_batch_ceiling_usd = -2.0
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_threshold_fails_validation() {
        let raw = r#"
            [llm]
            provider = "anthropic"
            model = "m"
            timeout_ms = 1000
            max_retries = 1

            [validation]
            validation_threshold = 140.0
            max_queries = 3
            results_per_query = 5
            max_sources = 4
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }
}
