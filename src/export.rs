use crate::consolidation::ConsolidatedDataset;
use crate::error::Result;
use std::io::Write;

/// Writes the consolidated dataset as CSV: one header row with the
/// canonical column names, then one row per record (dates as `dd/mm/YYYY`,
/// empty cells as empty fields).
pub fn write_canonical_csv<W: Write>(dataset: &ConsolidatedDataset, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&dataset.columns)?;

    for row in dataset.rows() {
        csv_writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn to_csv_string(dataset: &ConsolidatedDataset) -> Result<String> {
    let mut buffer = Vec::new();
    write_canonical_csv(dataset, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Writes the consolidated records as a JSON array keyed by canonical column names.
pub fn write_canonical_json<W: Write>(dataset: &ConsolidatedDataset, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &dataset.records)?;
    Ok(())
}
