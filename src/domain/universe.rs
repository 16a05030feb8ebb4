//! Static market universe: benchmark per market, sector ETFs with their
//! sector, and symbol-list parsing.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::StrengthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Market {
    Us,
    Kr,
}

impl Market {
    pub fn benchmark(self) -> &'static str {
        match self {
            Market::Us => "SPY",
            Market::Kr => "069500",
        }
    }

    pub fn sector_etfs(self) -> &'static [(&'static str, Sector)] {
        match self {
            Market::Us => US_SECTOR_ETFS,
            Market::Kr => KR_SECTOR_ETFS,
        }
    }

    /// Every sector ETF symbol, in table order.
    pub fn default_symbols(self) -> Vec<String> {
        self.sector_etfs().iter().map(|(s, _)| s.to_string()).collect()
    }

    pub fn sector_of(self, symbol: &str) -> Option<Sector> {
        self.sector_etfs()
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|&(_, sector)| sector)
    }
}

impl FromStr for Market {
    type Err = StrengthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "US" => Ok(Market::Us),
            "KR" => Ok(Market::Kr),
            other => Err(StrengthError::ConfigInvalid {
                section: "universe".into(),
                key: "market".into(),
                reason: format!("unknown market '{}', expected US or KR", other),
            }),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Us => write!(f, "US"),
            Market::Kr => write!(f, "KR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sector {
    Technology,
    Semiconductor,
    Financial,
    Banking,
    Healthcare,
    Biotechnology,
    ConsumerStaples,
    ConsumerDiscretionary,
    Retail,
    Communication,
    Media,
    Entertainment,
    Industrials,
    Automotive,
    Construction,
    Steel,
    Chemicals,
    Shipping,
    Energy,
    Materials,
    Utilities,
    RealEstate,
    Reits,
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sector::Technology => "Technology",
            Sector::Semiconductor => "Semiconductor",
            Sector::Financial => "Financial",
            Sector::Banking => "Banking",
            Sector::Healthcare => "Healthcare",
            Sector::Biotechnology => "Biotechnology",
            Sector::ConsumerStaples => "Consumer Staples",
            Sector::ConsumerDiscretionary => "Consumer Discretionary",
            Sector::Retail => "Retail",
            Sector::Communication => "Communication Services",
            Sector::Media => "Media",
            Sector::Entertainment => "Entertainment",
            Sector::Industrials => "Industrials",
            Sector::Automotive => "Automotive",
            Sector::Construction => "Construction",
            Sector::Steel => "Steel",
            Sector::Chemicals => "Chemicals",
            Sector::Shipping => "Shipping",
            Sector::Energy => "Energy",
            Sector::Materials => "Materials",
            Sector::Utilities => "Utilities",
            Sector::RealEstate => "Real Estate",
            Sector::Reits => "REITs",
        };
        f.write_str(name)
    }
}

const US_SECTOR_ETFS: &[(&str, Sector)] = &[
    ("XLK", Sector::Technology),
    ("SMH", Sector::Semiconductor),
    ("XLF", Sector::Financial),
    ("KBE", Sector::Banking),
    ("XLV", Sector::Healthcare),
    ("IBB", Sector::Biotechnology),
    ("XLP", Sector::ConsumerStaples),
    ("XLY", Sector::ConsumerDiscretionary),
    ("XLC", Sector::Communication),
    ("XLI", Sector::Industrials),
    ("CARZ", Sector::Automotive),
    ("XLE", Sector::Energy),
    ("XLB", Sector::Materials),
    ("XLU", Sector::Utilities),
    ("XLRE", Sector::RealEstate),
];

const KR_SECTOR_ETFS: &[(&str, Sector)] = &[
    ("091170", Sector::Semiconductor),
    ("091160", Sector::Banking),
    ("091180", Sector::Automotive),
    ("152100", Sector::Chemicals),
    ("244620", Sector::Biotechnology),
    ("105780", Sector::Financial),
    ("089490", Sector::Technology),
    ("143860", Sector::Healthcare),
    ("102780", Sector::Construction),
    ("102970", Sector::Steel),
    ("266370", Sector::Entertainment),
    ("139230", Sector::Reits),
    ("140710", Sector::Media),
    ("228790", Sector::Shipping),
    ("102960", Sector::Retail),
    ("227550", Sector::Industrials),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl From<UniverseError> for StrengthError {
    fn from(err: UniverseError) -> Self {
        StrengthError::ConfigInvalid {
            section: "universe".into(),
            key: "symbols".into(),
            reason: err.to_string(),
        }
    }
}

/// Parses a comma-separated symbol list, uppercased, order preserved.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmarks_per_market() {
        assert_eq!(Market::Us.benchmark(), "SPY");
        assert_eq!(Market::Kr.benchmark(), "069500");
    }

    #[test]
    fn market_parsing() {
        assert_eq!("us".parse::<Market>().unwrap(), Market::Us);
        assert_eq!(" KR ".parse::<Market>().unwrap(), Market::Kr);
        assert!(matches!(
            "JP".parse::<Market>(),
            Err(StrengthError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn default_symbols_exclude_benchmark() {
        for market in [Market::Us, Market::Kr] {
            let symbols = market.default_symbols();
            assert!(!symbols.is_empty());
            assert!(!symbols.iter().any(|s| s == market.benchmark()));
        }
        assert_eq!(Market::Us.default_symbols().len(), 15);
    }

    #[test]
    fn sector_lookup() {
        assert_eq!(Market::Us.sector_of("SMH"), Some(Sector::Semiconductor));
        assert_eq!(Market::Kr.sector_of("091170"), Some(Sector::Semiconductor));
        assert_eq!(Market::Us.sector_of("091170"), None);
        assert_eq!(Sector::RealEstate.to_string(), "Real Estate");
    }

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols("  xlk , XLE,smh").unwrap();
        assert_eq!(result, vec!["XLK", "XLE", "SMH"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        assert_eq!(parse_symbols("XLK,,XLE"), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_symbols_duplicate() {
        let result = parse_symbols("XLK,XLE,xlk");
        assert!(matches!(result, Err(UniverseError::DuplicateSymbol(s)) if s == "XLK"));
    }

    #[test]
    fn universe_error_maps_to_config_error() {
        let err: StrengthError = UniverseError::EmptyToken.into();
        assert_eq!(
            err.to_string(),
            "invalid config value [universe] symbols: empty token in symbol list"
        );
    }
}
