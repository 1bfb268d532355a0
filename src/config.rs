use std::collections::HashMap;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};
use log::warn;

/// Main configuration structure for todo_ranker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote model service settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Model selection per call kind
    #[serde(default)]
    pub models: ModelsConfig,

    /// Sampling temperature per call kind
    #[serde(default)]
    pub temperatures: TemperatureConfig,

    /// Recommendation decoding
    #[serde(default)]
    pub recommendation: RecommendationConfig,

    /// UI display configuration
    #[serde(default)]
    pub ui: UIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used by the title and deadline extractors
    #[serde(default = "default_extraction_model")]
    pub extraction: String,

    /// Model used by the priority recommender
    #[serde(default = "default_recommendation_model")]
    pub recommendation: String,

    /// Model used for the page greeting
    #[serde(default = "default_greeting_model")]
    pub greeting: String,

    /// Pricing keyed by model name
    #[serde(default = "default_pricing")]
    pub pricing: HashMap<String, ModelPricing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    pub cost_per_1m_input_tokens: Option<f32>,
    pub cost_per_1m_output_tokens: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureConfig {
    #[serde(default = "default_extraction_temperature")]
    pub extraction: f32,

    #[serde(default = "default_recommendation_temperature")]
    pub recommendation: f32,

    /// The greeting favours variety over accuracy
    #[serde(default = "default_greeting_temperature")]
    pub greeting: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Retry decoding after stripping Markdown code fences
    #[serde(default = "default_lenient_fallback")]
    pub lenient_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UIConfig {
    /// Enable colorful output
    #[serde(default = "default_colorful")]
    pub colorful: bool,

    /// Show a spinner while waiting on the model
    #[serde(default = "default_spinner")]
    pub spinner: bool,

    /// Show the sorting hint banner until dismissed
    #[serde(default = "default_show_info")]
    pub show_info: bool,

    /// chrono format string for the Created column
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

// Default value functions
fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_extraction_model() -> String { "gpt-4o-mini".to_string() }
fn default_recommendation_model() -> String { "gpt-4o".to_string() }
fn default_greeting_model() -> String { "gpt-4o".to_string() }
fn default_extraction_temperature() -> f32 { 0.0 }
fn default_recommendation_temperature() -> f32 { 0.0 }
fn default_greeting_temperature() -> f32 { 1.2 }
fn default_lenient_fallback() -> bool { true }
fn default_colorful() -> bool { true }
fn default_spinner() -> bool { true }
fn default_show_info() -> bool { true }
fn default_date_format() -> String { "%m-%d".to_string() }

fn default_pricing() -> HashMap<String, ModelPricing> {
    let mut pricing = HashMap::new();
    pricing.insert(
        "gpt-4o".to_string(),
        ModelPricing {
            cost_per_1m_input_tokens: Some(2.5),
            cost_per_1m_output_tokens: Some(10.0),
        },
    );
    pricing.insert(
        "gpt-4o-mini".to_string(),
        ModelPricing {
            cost_per_1m_input_tokens: Some(0.15),
            cost_per_1m_output_tokens: Some(0.6),
        },
    );
    pricing
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            extraction: default_extraction_model(),
            recommendation: default_recommendation_model(),
            greeting: default_greeting_model(),
            pricing: default_pricing(),
        }
    }
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            extraction: default_extraction_temperature(),
            recommendation: default_recommendation_temperature(),
            greeting: default_greeting_temperature(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self { lenient_fallback: default_lenient_fallback() }
    }
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            colorful: default_colorful(),
            spinner: default_spinner(),
            show_info: default_show_info(),
            date_format: default_date_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gateway: GatewayConfig::default(),
            models: ModelsConfig::default(),
            temperatures: TemperatureConfig::default(),
            recommendation: RecommendationConfig::default(),
            ui: UIConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    /// Load configuration from command line argument or default locations.
    /// Returns the path that was used, if any.
    pub fn load(config_path: &Option<String>) -> Result<(Self, Option<String>)> {
        if let Some(path) = config_path {
            let expanded = shellexpand::tilde(path);
            return Ok((Self::from_file(expanded.as_ref())?, Some(path.clone())));
        }

        let default_paths = [
            "todo_ranker.toml",
            ".todo_ranker.toml",
            "~/.config/todo_ranker/config.toml",
        ];

        for path in default_paths {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                match Self::from_file(expanded_path.as_ref()) {
                    Ok(config) => return Ok((config, Some(path.to_string()))),
                    Err(e) => warn!("Failed to load config from {}: {:#}", path, e),
                }
            }
        }

        Ok((Self::default(), None))
    }

    /// Pricing for a model, if configured
    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.models.pricing.get(model)
    }

    /// Merge with command-line arguments (CLI args take precedence)
    pub fn merge_with_args(&mut self, plain: bool) {
        if plain {
            self.ui.colorful = false;
            self.ui.spinner = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_model_roles() {
        let config = Config::default();
        assert_eq!(config.models.extraction, "gpt-4o-mini");
        assert_eq!(config.models.recommendation, "gpt-4o");
        assert_eq!(config.temperatures.extraction, 0.0);
        assert_eq!(config.temperatures.recommendation, 0.0);
        assert_eq!(config.temperatures.greeting, 1.2);
        assert!(config.recommendation.lenient_fallback);
        assert_eq!(config.ui.date_format, "%m-%d");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            base_url = "http://localhost:8080/v1"

            [recommendation]
            lenient_fallback = false
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.base_url, "http://localhost:8080/v1");
        assert_eq!(config.gateway.api_key_env, "OPENAI_API_KEY");
        assert!(!config.recommendation.lenient_fallback);
        assert_eq!(config.models.greeting, "gpt-4o");
        assert!(config.ui.colorful);
    }

    #[test]
    fn test_pricing_lookup() {
        let config = Config::default();
        let pricing = config.pricing_for("gpt-4o-mini").unwrap();
        assert_eq!(pricing.cost_per_1m_input_tokens, Some(0.15));
        assert!(config.pricing_for("unknown-model").is_none());
    }

    #[test]
    fn test_plain_disables_decoration() {
        let mut config = Config::default();
        config.merge_with_args(true);
        assert!(!config.ui.colorful);
        assert!(!config.ui.spinner);
    }

    #[test]
    fn test_example_file_parses() {
        let config: Config = toml::from_str(include_str!("../todo_ranker.example.toml")).unwrap();
        assert_eq!(config.temperatures.greeting, 1.2);
        assert_eq!(config.pricing_for("gpt-4o").unwrap().cost_per_1m_output_tokens, Some(10.0));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.models.extraction, config.models.extraction);
        assert_eq!(parsed.models.pricing.len(), 2);
    }
}
