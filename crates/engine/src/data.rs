use std::io::Read;
use std::path::Path;

use tracing::info;

use common::{Bar, Error, Result, TradeRecord};

/// Load closed bars from a CSV file with the header
/// `open_time,open,high,low,close,volume` (RFC 3339 times, oldest first).
pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Data(format!("Failed to open bar file '{}': {e}", path.display()))
    })?;
    let bars = read_bars(file)?;
    info!(path = %path.display(), bars = bars.len(), "Bars loaded");
    Ok(bars)
}

/// Parse bars from any CSV source. Open times must strictly increase and
/// every bar must be internally consistent.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars: Vec<Bar> = Vec::new();

    for (row, record) in rdr.deserialize::<Bar>().enumerate() {
        let bar = record?;
        if !bar.is_sane() {
            return Err(Error::Data(format!(
                "row {}: inconsistent bar at {} (open {}, high {}, low {}, close {})",
                row + 1,
                bar.open_time,
                bar.open,
                bar.high,
                bar.low,
                bar.close
            )));
        }
        if let Some(prev) = bars.last() {
            if bar.open_time <= prev.open_time {
                return Err(Error::Data(format!(
                    "row {}: open time {} does not follow {}",
                    row + 1,
                    bar.open_time,
                    prev.open_time
                )));
            }
        }
        bars.push(bar);
    }

    Ok(bars)
}

/// Export closed trades as CSV.
pub fn write_trades_csv(path: impl AsRef<Path>, trades: &[TradeRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    for trade in trades {
        wtr.serialize(trade)?;
    }
    wtr.flush()?;
    Ok(())
}
