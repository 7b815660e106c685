//! CSV report output

use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::types::ExtractionRecord;

/// UTF-8 byte order mark, so spreadsheet tools detect the encoding
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write `records` as a CSV report at `path`, replacing any existing file
pub fn write_report(path: &Path, records: &[ExtractionRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_report_to(std::io::BufWriter::new(file), records)?;
    tracing::info!(path = %path.display(), rows = records.len(), "report written");
    Ok(())
}

/// Write the BOM, the header row and one row per record to `writer`
pub fn write_report_to<W: Write>(mut writer: W, records: &[ExtractionRecord]) -> Result<()> {
    writer.write_all(UTF8_BOM)?;

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(ExtractionRecord::FIELD_NAMES)?;
    for record in records {
        csv.write_record(record.values())?;
    }
    csv.flush()?;
    Ok(())
}
