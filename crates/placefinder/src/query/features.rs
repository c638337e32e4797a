use std::collections::BTreeSet;

use super::{QueryError, Result};

/// Allowed feature classes and feature codes.
///
/// An empty filter restricts nothing.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFilter {
    pub feature_classes: BTreeSet<String>,
    pub feature_codes: BTreeSet<String>,
}

/// A single token of a feature list, told apart by its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureToken {
    Class(String),
    Code(String),
}

impl FeatureToken {
    /// One character is a class, two to five characters are a code.
    pub fn classify(token: &str) -> Result<Self> {
        match token.chars().count() {
            1 => Ok(Self::Class(token.to_string())),
            2..=5 => Ok(Self::Code(token.to_string())),
            length => Err(QueryError::InvalidFeatureToken {
                token: token.to_string(),
                length,
            }),
        }
    }
}

impl FeatureFilter {
    /// Splits feature tokens into classes and codes.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for token in tokens {
            match FeatureToken::classify(token.as_ref())? {
                FeatureToken::Class(class) => filter.feature_classes.insert(class),
                FeatureToken::Code(code) => filter.feature_codes.insert(code),
            };
        }
        Ok(filter)
    }

    /// Parses a `|` separated token list such as `S|AIRP`.
    pub fn parse(list: &str) -> Result<Self> {
        Self::from_tokens(list.split('|'))
    }

    #[must_use]
    pub fn classes<I: IntoIterator<Item = S>, S: Into<String>>(classes: I) -> Self {
        Self {
            feature_classes: classes.into_iter().map(Into::into).collect(),
            feature_codes: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn codes<I: IntoIterator<Item = S>, S: Into<String>>(codes: I) -> Self {
        Self {
            feature_classes: BTreeSet::new(),
            feature_codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.feature_classes.is_empty() && self.feature_codes.is_empty()
    }

    /// Whether a row with this class and code passes the filter.
    #[must_use]
    pub fn allows(&self, feature_class: &str, feature_code: &str) -> bool {
        self.is_empty()
            || self.feature_classes.contains(feature_class)
            || self.feature_codes.contains(feature_code)
    }
}
