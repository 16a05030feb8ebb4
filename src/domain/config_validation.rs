//! Configuration validation.
//!
//! Every key is checked before any data is fetched, so a bad value fails
//! fast with the section and key that caused it. Absent optional keys fall
//! back to their defaults and are not errors.

use crate::domain::error::StrengthError;
use crate::domain::relative_strength::NormalizationMethod;
use crate::domain::universe::{parse_symbols, Market};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    validate_dates(config)?;
    validate_initial_capital(config)?;
    validate_risk_free_rate(config)?;
    Ok(())
}

pub fn validate_universe_config(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    if let Some(market) = config.get_string("universe", "market") {
        Market::from_str(&market)?;
    }
    if let Some(symbols) = config.get_string("universe", "symbols") {
        parse_symbols(&symbols)?;
    }
    if let Some(benchmark) = config.get_string("universe", "benchmark") {
        if benchmark.trim().is_empty() {
            return Err(invalid("universe", "benchmark", "must not be empty"));
        }
    }
    Ok(())
}

pub fn validate_rotation_config(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    positive_int(config, "rotation", "rebalance_freq")?;
    positive_int(config, "rotation", "top_n")?;
    positive_int(config, "rotation", "lookback_period")?;
    positive_int(config, "rotation", "signal_lookback")?;
    positive_int(config, "rotation", "rs_window")?;
    if let Some(method) = config.get_string("rotation", "normalization") {
        NormalizationMethod::from_str(&method)?;
    }
    Ok(())
}

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    positive_int(config, "signals", "price_ma_period")?;
    positive_int(config, "signals", "volume_ma_period")?;
    positive_int(config, "signals", "trend_days")?;
    positive_int(config, "signals", "obv_lookback")?;

    if let Some(threshold) = parse_key::<f64>(config, "signals", "volume_threshold")? {
        if threshold < 0.0 {
            return Err(invalid("signals", "volume_threshold", "must be non-negative"));
        }
    }
    if let Some(ratio) = parse_key::<f64>(config, "signals", "trend_ratio")? {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(invalid("signals", "trend_ratio", "must be between 0 and 1"));
        }
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    match config.get_string("data", "source").as_deref().map(str::trim) {
        None | Some("csv") => {
            if config.get_string("data", "csv_dir").is_none() {
                return Err(StrengthError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                });
            }
        }
        Some("sqlite") => {
            if config.get_string("sqlite", "path").is_none() {
                return Err(StrengthError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                });
            }
            positive_int(config, "sqlite", "pool_size")?;
        }
        Some(other) => {
            return Err(invalid(
                "data",
                "source",
                &format!("unknown source '{}', expected csv or sqlite", other),
            ));
        }
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    if let Some(value) = parse_key::<f64>(config, "backtest", "initial_capital")? {
        if value <= 0.0 {
            return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    if let Some(value) = parse_key::<f64>(config, "backtest", "risk_free_rate")? {
        if !(0.0..1.0).contains(&value) {
            return Err(invalid("backtest", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
        }
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;
    StrengthError::check_range(start_date, end_date)
}

fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, StrengthError> {
    match config.get_string("backtest", field) {
        None => Err(StrengthError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                &format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

/// Parses `[section] key` when present. `get_int`/`get_double` silently
/// fall back to defaults on garbage, so validation reads the raw string.
fn parse_key<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, StrengthError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("cannot parse '{}'", raw.trim()))),
    }
}

fn positive_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), StrengthError> {
    if let Some(value) = parse_key::<i64>(config, section, key)? {
        if value <= 0 {
            return Err(invalid(section, key, &format!("{} must be positive", key)));
        }
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> StrengthError {
    StrengthError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID_BACKTEST: &str = "[backtest]\nstart_date = 2023-01-01\nend_date = 2023-12-31\n";

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            "[backtest]\nstart_date = 2023-01-01\nend_date = 2023-12-31\ninitial_capital = 10000\nrisk_free_rate = 0.02\n",
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn initial_capital_is_optional() {
        assert!(validate_backtest_config(&make_config(VALID_BACKTEST)).is_ok());
    }

    #[test]
    fn initial_capital_zero_fails() {
        let config = make_config(&format!("{}initial_capital = 0\n", VALID_BACKTEST));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, StrengthError::ConfigInvalid { ref key, .. } if key == "initial_capital"));
    }

    #[test]
    fn initial_capital_garbage_fails() {
        let config = make_config(&format!("{}initial_capital = lots\n", VALID_BACKTEST));
        assert!(validate_backtest_config(&config).is_err());
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let config = make_config(&format!("{}risk_free_rate = 1.5\n", VALID_BACKTEST));
        assert!(validate_backtest_config(&config).is_err());
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config("[backtest]\nstart_date = 01/01/2023\nend_date = 2023-12-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, StrengthError::ConfigInvalid { ref key, .. } if key == "start_date"));
    }

    #[test]
    fn missing_end_date_fails() {
        let config = make_config("[backtest]\nstart_date = 2023-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, StrengthError::ConfigMissing { ref key, .. } if key == "end_date"));
    }

    #[test]
    fn end_before_start_is_invalid_range() {
        let config = make_config("[backtest]\nstart_date = 2023-12-31\nend_date = 2023-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, StrengthError::InvalidDateRange { .. }));
    }

    #[test]
    fn universe_accepts_known_market() {
        let config = make_config("[universe]\nmarket = kr\nsymbols = 091170,091160\n");
        assert!(validate_universe_config(&config).is_ok());
    }

    #[test]
    fn universe_rejects_unknown_market() {
        let config = make_config("[universe]\nmarket = JP\n");
        assert!(validate_universe_config(&config).is_err());
    }

    #[test]
    fn universe_rejects_duplicate_symbols() {
        let config = make_config("[universe]\nsymbols = XLK,XLE,XLK\n");
        let err = validate_universe_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate symbol: XLK"));
    }

    #[test]
    fn rotation_defaults_pass() {
        assert!(validate_rotation_config(&make_config("[rotation]\n")).is_ok());
    }

    #[test]
    fn rotation_unknown_normalization_fails() {
        let config = make_config("[rotation]\nnormalization = median\n");
        let err = validate_rotation_config(&config).unwrap_err();
        assert!(matches!(err, StrengthError::UnknownMethod { .. }));
    }

    #[test]
    fn rotation_zero_top_n_fails() {
        let config = make_config("[rotation]\ntop_n = 0\n");
        assert!(validate_rotation_config(&config).is_err());
    }

    #[test]
    fn signals_trend_ratio_range() {
        assert!(validate_signal_config(&make_config("[signals]\ntrend_ratio = 0.6\n")).is_ok());
        assert!(validate_signal_config(&make_config("[signals]\ntrend_ratio = 1.2\n")).is_err());
    }

    #[test]
    fn signals_negative_threshold_fails() {
        let config = make_config("[signals]\nvolume_threshold = -1\n");
        assert!(validate_signal_config(&config).is_err());
    }

    #[test]
    fn data_csv_requires_dir() {
        let err = validate_data_config(&make_config("[data]\nsource = csv\n")).unwrap_err();
        assert!(matches!(err, StrengthError::ConfigMissing { ref key, .. } if key == "csv_dir"));
        assert!(validate_data_config(&make_config("[data]\ncsv_dir = ./prices\n")).is_ok());
    }

    #[test]
    fn data_sqlite_requires_path() {
        let err = validate_data_config(&make_config("[data]\nsource = sqlite\n")).unwrap_err();
        assert!(matches!(err, StrengthError::ConfigMissing { ref section, .. } if section == "sqlite"));
    }

    #[test]
    fn data_unknown_source_fails() {
        let err = validate_data_config(&make_config("[data]\nsource = parquet\n")).unwrap_err();
        assert!(err.to_string().contains("unknown source 'parquet'"));
    }
}
