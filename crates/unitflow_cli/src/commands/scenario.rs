//! Scenario command implementation.

use super::CliError;
use unitflow_testkit::{find, ScenarioOutcome};

/// Runs the scenario command.
pub fn run(name: &str, format: &str, check: bool) -> Result<(), CliError> {
    let scenario = find(name).ok_or_else(|| CliError::UnknownScenario(name.to_string()))?;
    tracing::info!(scenario = scenario.name, "running scenario");
    let outcome = scenario.run();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        _ => {
            print_text_output(&outcome, scenario.description);
        }
    }

    match (&outcome.error, check) {
        (Some(message), true) => Err(CliError::ScenarioFailed {
            name: outcome.name.clone(),
            message: message.clone(),
        }),
        _ => Ok(()),
    }
}

fn print_text_output(outcome: &ScenarioOutcome, description: &str) {
    println!("Scenario: {}", outcome.name);
    println!("  {description}");
    println!();
    println!("Result:");
    match &outcome.error {
        None => println!("  committed"),
        Some(error) => println!("  failed: {error}"),
    }
    println!("  Visited:   {}", outcome.visited);
    println!("  Processed: {}", outcome.processed);
    println!("  Commands:  {}", outcome.commands);
    println!();
    println!("Statements:");
    if outcome.statements.is_empty() {
        println!("  (none)");
    }
    for statement in &outcome.statements {
        println!("  {statement}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_scenario_is_an_error() {
        let err = run("nope", "json", false).unwrap_err();
        assert!(matches!(err, CliError::UnknownScenario(_)));
    }

    #[test]
    fn check_flags_failed_runs() {
        assert!(run("blog", "json", true).is_ok());
        let err = run("blocked-delete", "json", true).unwrap_err();
        assert!(err.to_string().contains("blocked-delete"));
    }
}
