//! Localization
//!
//! Minimal multi-language text support: a text table keyed by
//! [`Language`], resolved for the execution's configured language, and
//! positional `$0`, `$1`, ... placeholder filling.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages a text can be provided in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
    Fr,
    Es,
    It,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Language::En => "en",
            Language::De => "de",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::It => "it",
        };
        f.write_str(code)
    }
}

/// A text given in several languages.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiLanguageText(HashMap<Language, String>);

impl MultiLanguageText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the text for `language`.
    pub fn with(mut self, language: Language, text: impl Into<String>) -> Self {
        self.0.insert(language, text.into());
        self
    }

    /// Resolves the text for `language`.
    ///
    /// Falls back to English, then to an empty string.
    pub fn for_language(&self, language: Language) -> &str {
        self.0
            .get(&language)
            .or_else(|| self.0.get(&Language::default()))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Replaces placeholders in every language variant.
    pub fn filling(&self, arguments: &[&str]) -> MultiLanguageText {
        MultiLanguageText(
            self.0
                .iter()
                .map(|(language, text)| (*language, fill_placeholders(text, arguments)))
                .collect(),
        )
    }
}

impl<S: Into<String>, const N: usize> From<[(Language, S); N]> for MultiLanguageText {
    fn from(entries: [(Language, S); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(language, text)| (language, text.into()))
                .collect(),
        )
    }
}

/// Replaces `$0`, `$1`, ... with the argument at that position.
///
/// Placeholders without a corresponding argument are left untouched.
pub fn fill_placeholders(text: &str, arguments: &[&str]) -> String {
    let mut filled = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(position) = rest.find('$') {
        filled.push_str(&rest[..position]);
        let after = &rest[position + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();

        let argument = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|index| arguments.get(index));

        match argument {
            Some(argument) => {
                filled.push_str(argument);
                rest = &after[digits..];
            }
            None => {
                filled.push('$');
                rest = after;
            }
        }
    }

    filled.push_str(rest);
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_configured_language() {
        let text = MultiLanguageText::from([(Language::En, "hello"), (Language::De, "hallo")]);
        assert_eq!(text.for_language(Language::De), "hallo");
        assert_eq!(text.for_language(Language::En), "hello");
    }

    #[test]
    fn test_falls_back_to_english() {
        let text = MultiLanguageText::new().with(Language::En, "hello");
        assert_eq!(text.for_language(Language::Fr), "hello");
        assert_eq!(MultiLanguageText::new().for_language(Language::Fr), "");
    }

    #[test]
    fn test_fill_placeholders_positional() {
        assert_eq!(
            fill_placeholders("\"$0\" and \"$1\" are not OK", &["A", "B"]),
            "\"A\" and \"B\" are not OK"
        );
    }

    #[test]
    fn test_fill_placeholders_leaves_unmatched() {
        assert_eq!(fill_placeholders("$0 costs $2", &["beer"]), "beer costs $2");
        assert_eq!(fill_placeholders("just $ and $x", &["a"]), "just $ and $x");
    }

    #[test]
    fn test_fill_placeholders_multi_digit() {
        let arguments: Vec<String> = (0..11).map(|i| format!("v{}", i)).collect();
        let arguments: Vec<&str> = arguments.iter().map(String::as_str).collect();
        assert_eq!(fill_placeholders("$10/$1", &arguments), "v10/v1");
    }

    #[test]
    fn test_filling_all_languages() {
        let text =
            MultiLanguageText::from([(Language::En, "got $0"), (Language::De, "$0 erhalten")]);
        let filled = text.filling(&["x"]);
        assert_eq!(filled.for_language(Language::En), "got x");
        assert_eq!(filled.for_language(Language::De), "x erhalten");
    }
}
