//! CSV export of backtest ledgers, value series and RS tables.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::StrengthError;
use crate::domain::portfolio::PortfolioValueSample;
use crate::domain::position::TradeRecord;
use crate::domain::series::WideTable;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn write_trades<W: Write>(out: W, trades: &[TradeRecord]) -> Result<(), StrengthError> {
    let mut wtr = csv::Writer::from_writer(out);
    for trade in trades {
        wtr.serialize(trade)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_values<W: Write>(out: W, values: &[PortfolioValueSample]) -> Result<(), StrengthError> {
    let mut wtr = csv::Writer::from_writer(out);
    for sample in values {
        wtr.serialize(sample)?;
    }
    wtr.flush()?;
    Ok(())
}

/// `date` column followed by one column per symbol; gaps are empty cells.
pub fn write_table<W: Write>(out: W, table: &WideTable) -> Result<(), StrengthError> {
    let mut wtr = csv::Writer::from_writer(out);

    let mut header = vec!["date".to_string()];
    header.extend(table.symbols().iter().cloned());
    wtr.write_record(&header)?;

    for (row, date) in table.dates().iter().enumerate() {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(
            table
                .columns()
                .iter()
                .map(|col| col[row].map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `trades.csv` and `values.csv` under `dir`, creating it if needed.
pub fn export_backtest(dir: &Path, result: &BacktestResult) -> Result<Vec<PathBuf>, StrengthError> {
    fs::create_dir_all(dir)?;
    let trades_path = dir.join("trades.csv");
    let values_path = dir.join("values.csv");
    write_trades(fs::File::create(&trades_path)?, &result.trades)?;
    write_values(fs::File::create(&values_path)?, &result.values)?;
    Ok(vec![trades_path, values_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::TradeAction;
    use crate::domain::series::{SeriesPoint, TimeSeries};
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn trades_have_header_and_action_labels() {
        let trades = vec![
            TradeRecord {
                date: d(2),
                symbol: "XLK".into(),
                action: TradeAction::Buy,
                shares: 100.0,
                price: 100.0,
                value: 10_000.0,
            },
            TradeRecord {
                date: d(9),
                symbol: "XLK".into(),
                action: TradeAction::EndOfPeriodSell,
                shares: 100.0,
                price: 120.0,
                value: 12_000.0,
            },
        ];
        let mut buf = Vec::new();
        write_trades(&mut buf, &trades).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "date,symbol,action,shares,price,value");
        assert_eq!(lines[1], "2024-01-02,XLK,BUY,100.0,100.0,10000.0");
        assert_eq!(lines[2], "2024-01-09,XLK,SELL (End),100.0,120.0,12000.0");
    }

    #[test]
    fn values_serialize() {
        let mut buf = Vec::new();
        write_values(&mut buf, &[PortfolioValueSample { date: d(2), value: 10_500.5 }]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "date,value\n2024-01-02,10500.5\n");
    }

    #[test]
    fn table_gaps_are_empty_cells() {
        let a = TimeSeries::new(vec![SeriesPoint { date: d(2), value: Some(1.5) }]);
        let b = TimeSeries::new(vec![SeriesPoint { date: d(3), value: Some(0.5) }]);
        let table = WideTable::outer_join(vec![("A".into(), a), ("B".into(), b)]);

        let mut buf = Vec::new();
        write_table(&mut buf, &table).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "date,A,B\n2024-01-02,1.5,\n2024-01-03,,0.5\n"
        );
    }
}
