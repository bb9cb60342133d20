use super::OutputFormat;
use crate::error::Result;
use crate::logger::Logger;
use crate::query::{self, ActivityStats};

/// Execute the `stats` command: print entry totals.
pub fn execute(logger: &Logger, format: OutputFormat) -> Result<()> {
    let stats = query::stats(logger.storage().as_ref(), logger.registry())?;
    print!("{}", render(&stats, format)?);
    Ok(())
}

pub fn render(stats: &ActivityStats, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(stats)? + "\n"),
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            {
                let mut writer = csv::Writer::from_writer(&mut buf);
                writer.write_record(["group", "key", "count"])?;
                let total = stats.total.to_string();
                writer.write_record(["total", "", total.as_str()])?;
                for (group, counts) in sections(stats) {
                    for (key, count) in counts {
                        let count = count.to_string();
                        writer.write_record([group, key.as_str(), count.as_str()])?;
                    }
                }
                writer.flush()?;
            }
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
        OutputFormat::Table => {
            let mut out = format!("Total entries: {}\n", stats.total);
            for (group, counts) in sections(stats) {
                out.push_str(&format!("\nBy {}:\n", group));
                for (key, count) in counts {
                    out.push_str(&format!("  {:<24} {}\n", key, count));
                }
            }
            Ok(out)
        }
    }
}

fn sections(
    stats: &ActivityStats,
) -> [(&'static str, &std::collections::BTreeMap<String, u64>); 3] {
    [
        ("owner", &stats.by_owner),
        ("behaviour", &stats.by_behaviour),
        ("level", &stats.by_level),
    ]
}
