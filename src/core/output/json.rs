use std::{fs::File, io::BufWriter, path::Path};

use crate::core::{
    Result,
    output::{ResultWriter, SessionSummary},
};

pub struct JsonWriter;

impl ResultWriter for JsonWriter {
    fn write(&self, summary: &SessionSummary, path: &Path) -> Result<()> {
        let json_path = path.join("results.json");
        let writer = BufWriter::new(File::create(&json_path)?);
        serde_json::to_writer_pretty(writer, summary)?;

        tracing::info!("Results written to {}", json_path.display());
        Ok(())
    }
}
