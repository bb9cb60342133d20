use super::OutputFormat;
use crate::error::Result;
use crate::registry::{ActionType, ActionTypeRegistry};

/// Execute the `types` command: print registered action types.
pub fn execute(registry: &ActionTypeRegistry, format: OutputFormat) -> Result<()> {
    print!("{}", render(registry, format)?);
    Ok(())
}

pub fn render(registry: &ActionTypeRegistry, format: OutputFormat) -> Result<String> {
    let types: Vec<ActionType> = registry
        .types()
        .into_iter()
        .map(|t| ActionType {
            label: registry.label(&t.owner, &t.type_key),
            ..t
        })
        .collect();

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&types)? + "\n"),
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            {
                let mut writer = csv::Writer::from_writer(&mut buf);
                writer.write_record(["owner", "type_key", "label", "description"])?;
                for t in &types {
                    writer.write_record([&t.owner, &t.type_key, &t.label, &t.description])?;
                }
                writer.flush()?;
            }
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
        OutputFormat::Table => {
            if types.is_empty() {
                return Ok("No action types registered.\n".to_string());
            }
            let mut out = format!("{:<20} {:<24} LABEL\n", "OWNER", "TYPE");
            for t in &types {
                out.push_str(&format!("{:<20} {:<24} {}\n", t.owner, t.type_key, t.label));
            }
            Ok(out)
        }
    }
}
