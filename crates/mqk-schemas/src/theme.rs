//! Static theme classification for crypto symbols.
//!
//! Themes are a coarse sector tag (L1, AI, DeFi, ...) attached to a symbol for
//! analytics grouping. They never gate a trigger or exit rule.

/// Sector tag attached to a symbol at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    L1,
    L2,
    Ai,
    DeFi,
    Meme,
    Payments,
    Exchange,
    Stable,
    Other,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::L1 => "L1",
            Theme::L2 => "L2",
            Theme::Ai => "AI",
            Theme::DeFi => "DeFi",
            Theme::Meme => "Meme",
            Theme::Payments => "Payments",
            Theme::Exchange => "Exchange",
            Theme::Stable => "Stable",
            Theme::Other => "Other",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const THEME_MAP: &[(&str, Theme)] = &[
    ("BTC", Theme::L1),
    ("ETH", Theme::L1),
    ("SOL", Theme::L1),
    ("ADA", Theme::L1),
    ("AVAX", Theme::L1),
    ("DOT", Theme::L1),
    ("ATOM", Theme::L1),
    ("NEAR", Theme::L1),
    ("SUI", Theme::L1),
    ("APT", Theme::L1),
    ("TON", Theme::L1),
    ("ARB", Theme::L2),
    ("OP", Theme::L2),
    ("MATIC", Theme::L2),
    ("POL", Theme::L2),
    ("FET", Theme::Ai),
    ("AGIX", Theme::Ai),
    ("RNDR", Theme::Ai),
    ("TAO", Theme::Ai),
    ("WLD", Theme::Ai),
    ("UNI", Theme::DeFi),
    ("AAVE", Theme::DeFi),
    ("MKR", Theme::DeFi),
    ("LDO", Theme::DeFi),
    ("CRV", Theme::DeFi),
    ("LINK", Theme::DeFi),
    ("DOGE", Theme::Meme),
    ("SHIB", Theme::Meme),
    ("PEPE", Theme::Meme),
    ("WIF", Theme::Meme),
    ("BONK", Theme::Meme),
    ("XRP", Theme::Payments),
    ("XLM", Theme::Payments),
    ("LTC", Theme::Payments),
    ("BCH", Theme::Payments),
    ("BNB", Theme::Exchange),
    ("OKB", Theme::Exchange),
    ("CRO", Theme::Exchange),
    ("USDT", Theme::Stable),
    ("USDC", Theme::Stable),
    ("DAI", Theme::Stable),
];

/// Classify a symbol of the form `BASE-QUOTE`, `BASE/QUOTE`, `BASEUSDT`, or
/// `BASEKRW` into a theme. Unknown base assets classify as [`Theme::Other`].
pub fn classify_symbol_theme(symbol: &str) -> Theme {
    let base = base_asset(symbol);
    THEME_MAP
        .iter()
        .find(|(sym, _)| *sym == base)
        .map(|(_, theme)| *theme)
        .unwrap_or(Theme::Other)
}

/// Strip a known quote suffix from a raw symbol string to recover the base asset.
fn base_asset(symbol: &str) -> String {
    let upper = symbol.trim().to_ascii_uppercase();

    for sep in ['-', '/'] {
        if let Some((base, _quote)) = upper.split_once(sep) {
            return base.to_string();
        }
    }

    for suffix in ["USDT", "USDC", "KRW"] {
        if upper.len() > suffix.len() && upper.ends_with(suffix) {
            return upper[..upper.len() - suffix.len()].to_string();
        }
    }

    upper
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_dash_form() {
        assert_eq!(classify_symbol_theme("BTC-USD"), Theme::L1);
        assert_eq!(classify_symbol_theme("DOGE-USD"), Theme::Meme);
    }

    #[test]
    fn classifies_slash_and_suffix_forms() {
        assert_eq!(classify_symbol_theme("ETH/KRW"), Theme::L1);
        assert_eq!(classify_symbol_theme("UNIUSDT"), Theme::DeFi);
        assert_eq!(classify_symbol_theme("XRPKRW"), Theme::Payments);
    }

    #[test]
    fn unknown_base_is_other() {
        assert_eq!(classify_symbol_theme("ZZZZ-USD"), Theme::Other);
    }
}
