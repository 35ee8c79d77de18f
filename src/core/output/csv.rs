use std::path::Path;

use crate::core::{
    Result,
    output::{ResultWriter, SessionSummary},
};

pub struct CsvWriter;

impl ResultWriter for CsvWriter {
    fn write(&self, summary: &SessionSummary, path: &Path) -> Result<()> {
        let csv_path = path.join("results.csv");
        let mut writer = csv::Writer::from_path(&csv_path)?;

        writer.write_record(["engine", "bench", "nps", "samples", "threads", "sets"])?;

        for result in &summary.results {
            writer.write_record([
                &result.engine,
                &result.bench.to_string(),
                &result.nps.to_string(),
                &result.samples.to_string(),
                &summary.threads.to_string(),
                &summary.sets.to_string(),
            ])?;
        }

        writer.flush()?;
        tracing::info!("Results written to {}", csv_path.display());
        Ok(())
    }
}
