use std::path::Path;

use handlebars::Handlebars;
use serde_json::json;

use crate::core::{
    Result,
    output::{ResultWriter, SessionSummary},
};

pub struct ReportWriter;

const TPL_STR: &str = "# Engine Bench Calibration\n\n**Platform:** {{platform}}\n**CPU:** {{cpu}} ({{logical_cores}} logical cores)\n**Date:** {{date}}\n\n## Scenario\n* Each engine ran {{sets}} sample set(s) of {{threads}} concurrent bench run(s)\n\n## Results\n| Engine | Bench | NPS | Samples |\n|--------|-------|-----|---------|\n{{#each results}}\n| {{engine}} | {{bench}} | {{nps}} | {{samples}} |\n{{/each}}\n{{#if failures}}\n\n## Failed engines\n{{#each failures}}\n* **{{engine}}**: {{reason}}\n{{/each}}\n{{/if}}";

impl ResultWriter for ReportWriter {
    fn write(&self, summary: &SessionSummary, path: &Path) -> Result<()> {
        let results_path = path.join("results.md");
        let rendered = render_report(summary)?;

        std::fs::write(&results_path, rendered)?;

        tracing::info!("Report written to {}", results_path.display());
        Ok(())
    }
}

/// Render the Markdown report, with the fastest engine's NPS in bold.
fn render_report(summary: &SessionSummary) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_template_string("report", TPL_STR)?;

    let max_nps = summary.results.iter().map(|r| r.nps).max().unwrap_or(0);

    let table_results: Vec<_> = summary
        .results
        .iter()
        .map(|result| {
            let nps = if result.nps == max_nps && summary.results.len() > 1 {
                format!("**{}**", result.nps)
            } else {
                result.nps.to_string()
            };

            json!({
                "engine": result.engine,
                "bench": result.bench,
                "nps": nps,
                "samples": result.samples,
            })
        })
        .collect();

    let data = json!({
        "platform": summary.platform.os,
        "cpu": summary.platform.cpu,
        "logical_cores": summary.platform.logical_cores,
        "date": summary.date,
        "threads": summary.threads,
        "sets": summary.sets,
        "results": table_results,
        "failures": summary.failures,
    });

    Ok(handlebars.render("report", &data)?)
}
