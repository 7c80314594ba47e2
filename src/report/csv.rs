use anyhow::{Context, Result};
use std::path::Path;

use super::types::ApplicationRecord;

/// Write the record as a two-column `Field,Value` table
pub fn generate(record: &ApplicationRecord, site: &str, output: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create CSV report: {}", output.display()))?;

    writer.write_record(["Field", "Value"])?;
    for (field, value) in record.fields() {
        writer.write_record([field, value])?;
    }
    writer.write_record(["Platform", site])?;
    writer.flush()?;

    Ok(())
}
