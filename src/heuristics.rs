/// Spam-indicative terms in Spanish and English. Matched as plain substrings
/// of the lower-cased text.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "gana",
    "ganar",
    "premio",
    "felicidades",
    "urgente",
    "clic aquí",
    "click here",
    "loteria",
    "casino",
    "apuesta",
    "ecuabet",
    "bet",
    "bono",
    "regalo",
    "gratis",
    "free",
    "oferta",
    "descuento",
    "banco",
    "verify",
    "verificar",
    "cuenta bloqueada",
    "acción requerida",
    "ganaste",
    "transferencia",
    "herencia",
    "millones",
    "dólares",
];

/// Keyword scanner behind the first signal of the decision engine.
#[derive(Debug, Clone)]
pub struct KeywordScanner {
    keywords: Vec<String>,
}

impl Default for KeywordScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordScanner {
    pub fn new() -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS.iter().copied())
    }

    /// Build a scanner from a custom keyword list. Keywords are lower-cased
    /// and blank entries are dropped.
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn scan(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// The first keyword (in list order) contained in `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| text.contains(keyword.as_str()))
            .map(String::as_str)
    }
}
