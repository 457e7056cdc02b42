//! Results reporting and formatting.

use crate::metrics::BenchResults;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use mosaic_core::{select_level, OverviewPolicy, ReadOutcome, ResolutionLevel};

/// Formats benchmark results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(results: &BenchResults) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Mosaic Benchmark: {}", results.config_name)]);

        table.add_row(vec!["Duration:", &format!("{:.2}s", results.duration_secs)]);
        table.add_row(vec!["Reads:", &format!("{}", results.total_reads)]);
        table.add_row(vec![
            "Empty / Failed:",
            &format!("{} / {}", results.empty_reads, results.failed_reads),
        ]);
        table.add_row(vec![
            "Executor:",
            &format!(
                "{} (concurrency {})",
                if results.pooled { "pooled" } else { "inline" },
                results.concurrency
            ),
        ]);
        table.add_row(vec![
            "Reads/sec:",
            &format!("{:.1}", results.reads_per_second),
        ]);
        table.add_row(vec![
            "Throughput:",
            &format!("{:.2} Mpx/s", results.megapixels_per_second),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.2} / {:.2} / {:.2} / {:.2}",
                results.latency_p50, results.latency_p90, results.latency_p99, results.latency_max
            ),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec![
            "Granules/read:",
            &format!("{:.1}", results.granules_per_read),
        ]);
        table.add_row(vec![
            "Granules loaded:",
            &format!("{:.1}%", results.granule_load_rate),
        ]);
        for error in &results.errors {
            table.add_row(vec!["Error:", error.as_str()]);
        }

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(results: &BenchResults) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    /// Format results as CSV row.
    pub fn format_csv(results: &BenchResults) -> String {
        format!(
            "{},{},{},{},{:.1},{:.2},{:.2},{:.2},{:.2}",
            results.timestamp,
            results.config_name,
            results.pooled,
            results.total_reads,
            results.reads_per_second,
            results.megapixels_per_second,
            results.latency_p50,
            results.latency_p90,
            results.latency_p99
        )
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,config,pooled,reads,rps,mpx_per_sec,p50,p90,p99"
    }

    /// Summary of a single read.
    pub fn format_read(outcome: &ReadOutcome) -> String {
        let mosaic = match outcome {
            ReadOutcome::Empty => return "Empty: request does not touch the mosaic".to_string(),
            ReadOutcome::Mosaic(mosaic) => mosaic,
        };

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["Read", ""]);
        table.add_row(vec![
            "Size:".to_string(),
            format!("{}x{}", mosaic.raster.width, mosaic.raster.height),
        ]);
        table.add_row(vec!["World bounds:".to_string(), mosaic.world_bounds().to_string()]);
        table.add_row(vec![
            "Level:".to_string(),
            format!(
                "{} (subsampling {}x{})",
                mosaic.level, mosaic.subsampling_x, mosaic.subsampling_y
            ),
        ]);
        table.add_row(vec![
            "Granules:".to_string(),
            format!("{} matched, {} loaded", mosaic.matched, mosaic.loaded),
        ]);
        for band in &mosaic.bands {
            table.add_row(vec![
                format!("{}:", band.name),
                format!(
                    "{:?} {:?} no-data {:?}",
                    band.data_type, band.color_interpretation, band.no_data
                ),
            ]);
        }
        table.to_string()
    }

    /// Level and subsampling each policy picks for a set of requested
    /// resolutions.
    pub fn format_levels(levels: &[ResolutionLevel], requested: &[f64]) -> String {
        let mut table = Table::new();
        let mut header = vec!["requested".to_string()];
        header.extend(OverviewPolicy::all().iter().map(|p| p.to_string()));
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(header);

        for &res in requested {
            let mut row = vec![format!("{}", res)];
            for policy in OverviewPolicy::all() {
                let selection = select_level(ResolutionLevel::square(res), policy, levels);
                let level = levels.get(selection.level).map(|l| l.x).unwrap_or(f64::NAN);
                row.push(format!(
                    "L{} ({}) x{}",
                    selection.level, level, selection.subsampling_x
                ));
            }
            table.add_row(row);
        }
        table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_read_summary() {
        assert!(ResultsReport::format_read(&ReadOutcome::Empty).starts_with("Empty"));
    }

    #[test]
    fn test_levels_table_lists_every_policy() {
        let levels = [1.0, 2.0, 4.0].map(ResolutionLevel::square);
        let table = ResultsReport::format_levels(&levels, &[3.0]);
        for policy in OverviewPolicy::all() {
            assert!(table.contains(policy.as_str()));
        }
        // quality -> level 1, speed -> level 2
        assert!(table.contains("L1 (2) x1"));
        assert!(table.contains("L2 (4) x1"));
    }
}
