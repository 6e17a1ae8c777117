//! Field tokenizers. Both fold case and strip diacritics before splitting.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Symbols that are part of option names (`<name>`, `*`, dotted paths).
pub const TITLE_SYMBOLS: [char; 4] = ['<', '>', '*', '.'];

pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tokenizer {
    /// Alphanumerics plus `TITLE_SYMBOLS`; matched by substring.
    Title,
    /// Alphanumerics only; matched by prefix.
    Description,
}

impl Tokenizer {
    pub fn is_significant(self, c: char) -> bool {
        match self {
            Tokenizer::Title => c.is_alphanumeric() || TITLE_SYMBOLS.contains(&c),
            Tokenizer::Description => c.is_alphanumeric(),
        }
    }

    /// Maximal runs of significant characters of the normalized text.
    pub fn tokens(self, text: &str) -> Vec<String> {
        normalize(text)
            .split(|c: char| !self.is_significant(c))
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect()
    }
}
