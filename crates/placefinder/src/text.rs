//! Text representations of place names.
//!
//! Every name is indexed twice: once accent and punctuation normalized, once
//! additionally stemmed. A search term matches when each of its tokens is the
//! prefix of some token in either representation.

use std::fmt;

use tantivy::tokenizer::{
    AsciiFoldingFilter, Language, LowerCaser, RawTokenizer, SimpleTokenizer, Stemmer,
    TextAnalyzer, TokenStream,
};

/// Tokenizer pipelines shared by indexing, querying and reranking.
#[derive(Clone)]
pub struct TextNormalizer {
    language: Language,
    normalized: TextAnalyzer,
    stemmed: TextAnalyzer,
    folded: TextAnalyzer,
}

impl fmt::Debug for TextNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextNormalizer")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(Language::German)
    }
}

impl TextNormalizer {
    #[must_use]
    pub fn new(language: Language) -> Self {
        let normalized = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(AsciiFoldingFilter)
            .build();
        let stemmed = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(AsciiFoldingFilter)
            .filter(Stemmer::new(language))
            .build();
        let folded = TextAnalyzer::builder(RawTokenizer::default())
            .filter(LowerCaser)
            .filter(AsciiFoldingFilter)
            .build();
        Self {
            language,
            normalized,
            stemmed,
            folded,
        }
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// Lower-cased, accent-folded word tokens.
    #[must_use]
    pub fn normalized_tokens(&self, text: &str) -> Vec<String> {
        tokens(&mut self.normalized.clone(), text)
    }

    /// Normalized tokens reduced to their stems.
    #[must_use]
    pub fn stemmed_tokens(&self, text: &str) -> Vec<String> {
        tokens(&mut self.stemmed.clone(), text)
    }

    /// ASCII transliteration of the whole text, lower-cased. `Straße` becomes
    /// `strasse`.
    #[must_use]
    pub fn transliterate(&self, text: &str) -> String {
        tokens(&mut self.folded.clone(), text).concat()
    }

    /// Normalized and stemmed representations of a name and its comma separated
    /// alternate names.
    #[must_use]
    pub fn representations(&self, name: &str, alternate_names: Option<&str>) -> (String, String) {
        let text = match alternate_names {
            Some(alternates) => format!("{name} {alternates}"),
            None => name.to_string(),
        };
        (
            representation(&self.normalized_tokens(&text)),
            representation(&self.stemmed_tokens(&text)),
        )
    }
}

fn tokens(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut stream = analyzer.token_stream(text);
    stream.process(&mut |token| out.push(token.text.clone()));
    out
}

/// Joins tokens into a space padded string, so that `" {prefix}"` occurs in it
/// exactly when some token starts with `prefix`.
fn representation(tokens: &[String]) -> String {
    if tokens.is_empty() {
        return String::new();
    }
    format!(" {} ", tokens.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_all_prefixes(representation: &str, query_tokens: &[String]) -> bool {
        query_tokens
            .iter()
            .all(|token| representation.contains(&format!(" {token}")))
    }

    #[test]
    fn test_normalized_tokens_fold_accents_and_split_punctuation() {
        let normalizer = TextNormalizer::default();
        assert_eq!(
            normalizer.normalized_tokens("Berlín-Mitte, Straße"),
            ["berlin", "mitte", "strasse"]
        );
        assert!(normalizer.normalized_tokens("  ,, ").is_empty());
    }

    #[test]
    fn test_stemmed_tokens_differ_from_normalized() {
        let normalizer = TextNormalizer::default();
        let stemmed = normalizer.stemmed_tokens("Flughafens");
        assert_eq!(stemmed.len(), 1);
        assert!("flughafens".starts_with(&stemmed[0]));
        assert_ne!(stemmed[0], "flughafens");
    }

    #[test]
    fn test_transliterate_keeps_whole_text() {
        let normalizer = TextNormalizer::default();
        assert_eq!(normalizer.transliterate("Großer Müggelsee"), "grosser muggelsee");
        assert_eq!(normalizer.transliterate("Las Palmas de Gran Canaria"), "las palmas de gran canaria");
    }

    #[test]
    fn test_representation_prefix_matching() {
        let normalizer = TextNormalizer::default();
        let (normalized, _) =
            normalizer.representations("Schloss Cecilienhof", Some("Cecilienhof Palace"));
        assert_eq!(normalized, " schloss cecilienhof cecilienhof palace ");

        let query = normalizer.normalized_tokens("cecil schl");
        assert!(matches_all_prefixes(&normalized, &query));
        // infix is not a prefix
        assert!(!matches_all_prefixes(&normalized, &normalizer.normalized_tokens("lienhof")));
        assert!(matches_all_prefixes(&normalized, &[]));
        assert!(!matches_all_prefixes("", &query));
    }
}
