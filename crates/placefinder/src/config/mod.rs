use tantivy::tokenizer::Language;

use crate::{error::PlacefinderError, plan::DEFAULT_DISTANCE_PENALTY};

/// Service wide search settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Page size used when a search gives no limit. `None` returns every row.
    pub default_limit: Option<usize>,
    /// Maximum number of autocomplete suggestions.
    pub autocomplete_limit: usize,
    /// Relevance points subtracted per meter of effective distance.
    pub distance_penalty: f64,
    /// Search radius around an anchor when resolving admin levels.
    pub admin_radius_meters: f64,
    /// Stemmer language of the stemmed name representation.
    pub language: Language,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: Some(20),
            autocomplete_limit: 10,
            distance_penalty: DEFAULT_DISTANCE_PENALTY,
            admin_radius_meters: 20_000.0,
            language: Language::German,
        }
    }
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::new()
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Dense areas: admin units are small and a kilometer matters
    pub fn urban() -> Self {
        let mut builder = Self::new();
        builder.config.admin_radius_meters = 5_000.0;
        builder.config.distance_penalty = 0.02;
        builder
    }

    /// Sparse areas: admin units span tens of kilometers
    pub fn rural() -> Self {
        let mut builder = Self::new();
        builder.config.admin_radius_meters = 50_000.0;
        builder.config.distance_penalty = 0.002;
        builder.config.autocomplete_limit = 20;
        builder
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.config.default_limit = Some(limit);
        self
    }

    /// Return every matching row when a search gives no limit
    pub fn unlimited(mut self) -> Self {
        self.config.default_limit = None;
        self
    }

    pub fn autocomplete_limit(mut self, limit: usize) -> Self {
        self.config.autocomplete_limit = limit;
        self
    }

    pub fn distance_penalty(mut self, penalty: f64) -> Self {
        self.config.distance_penalty = penalty;
        self
    }

    pub fn admin_radius(mut self, meters: f64) -> Self {
        self.config.admin_radius_meters = meters;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<SearchConfig, PlacefinderError> {
        let config = self.config;
        if config.default_limit == Some(0) || config.autocomplete_limit == 0 {
            return Err(PlacefinderError::ConfigError(
                "Limits must be at least 1".to_string(),
            ));
        }
        if !(config.distance_penalty.is_finite() && config.distance_penalty >= 0.0) {
            return Err(PlacefinderError::ConfigError(format!(
                "Distance penalty must be a non-negative number, got {}",
                config.distance_penalty
            )));
        }
        if !(config.admin_radius_meters.is_finite() && config.admin_radius_meters > 0.0) {
            return Err(PlacefinderError::ConfigError(format!(
                "Admin radius must be positive, got {}",
                config.admin_radius_meters
            )));
        }
        Ok(config)
    }
}
