//! List command implementation.

use super::CliError;
use serde::Serialize;
use unitflow_testkit::scenarios;

/// One listed scenario.
#[derive(Debug, Serialize)]
pub struct ScenarioEntry {
    /// Scenario name.
    pub name: &'static str,
    /// What it shows.
    pub description: &'static str,
}

/// Runs the list command.
pub fn run(format: &str) -> Result<(), CliError> {
    let entries: Vec<ScenarioEntry> = scenarios()
        .iter()
        .map(|s| ScenarioEntry {
            name: s.name,
            description: s.description,
        })
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
            println!("Scenarios");
            println!("=========");
            for entry in &entries {
                println!("  {:<width$}  {}", entry.name, entry.description);
            }
        }
    }

    Ok(())
}
