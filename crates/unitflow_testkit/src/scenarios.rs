//! Named end-to-end scenarios.
//!
//! Each scenario builds a fixture schema, runs one or more units of work and
//! reports the statements the last run issued. The CLI replays them.

use crate::fixtures::{self, ChildPolicy};
use crate::harness::Harness;
use serde::Serialize;
use unitflow_core::{Entity, EntityId, Related, RunResult};
use unitflow_storage::{Statement, StatementKind};

/// What a scenario's final run did.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    /// Scenario name.
    pub name: String,
    /// Whether the final run committed.
    pub success: bool,
    /// Error message of a failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Records visited by the scheduler.
    pub visited: usize,
    /// Records processed.
    pub processed: usize,
    /// Command leaves executed.
    pub commands: usize,
    /// Statements issued by the final run, database by database.
    pub statements: Vec<Statement>,
}

impl ScenarioOutcome {
    fn capture(name: &str, harness: &Harness, result: &RunResult) -> Self {
        let report = result.report();
        Self {
            name: name.to_string(),
            success: result.is_success(),
            error: result.error().map(ToString::to_string),
            visited: report.visited,
            processed: report.processed,
            commands: report.commands,
            statements: harness.statements(),
        }
    }
}

/// A named, replayable scenario.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    /// Short name used on the command line.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    run: fn(&'static str) -> ScenarioOutcome,
}

impl Scenario {
    /// Runs the scenario on fresh databases.
    pub fn run(&self) -> ScenarioOutcome {
        (self.run)(self.name)
    }
}

/// Every scenario, in display order.
pub fn scenarios() -> &'static [Scenario] {
    const SCENARIOS: &[Scenario] = &[
        Scenario {
            name: "blog",
            description: "new user with two posts: the user is inserted first",
            run: blog,
        },
        Scenario {
            name: "inheritance",
            description: "new manager: persons, employees, managers share one key",
            run: inheritance,
        },
        Scenario {
            name: "cycle",
            description: "user and post referencing each other: insert, insert, update",
            run: cycle,
        },
        Scenario {
            name: "cascade-delete",
            description: "deleting a user deletes its posts first",
            run: cascade_delete,
        },
        Scenario {
            name: "nullify",
            description: "deleting a user clears the author of its posts",
            run: nullify,
        },
        Scenario {
            name: "blocked-delete",
            description: "deleting a user whose posts may not be touched fails",
            run: blocked_delete,
        },
        Scenario {
            name: "rollback",
            description: "a failing insert rolls back the whole unit of work",
            run: rollback,
        },
        Scenario {
            name: "embedded",
            description: "embedded address written into the user's row",
            run: embedded,
        },
    ];
    SCENARIOS
}

/// Looks a scenario up by name.
pub fn find(name: &str) -> Option<&'static Scenario> {
    scenarios().iter().find(|s| s.name == name)
}

fn blog(name: &'static str) -> ScenarioOutcome {
    let mut h = Harness::new(fixtures::blog());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let first = h.insert(Entity::new("post").with("title", "hello").with_one("author", Some(user)));
    let second = h.insert(Entity::new("post").with("title", "again").with_one("author", Some(user)));
    h.entity_mut(user).set_relation("posts", Related::Many(vec![first, second]));

    let result = h.persist(&[user]);
    ScenarioOutcome::capture(name, &h, &result)
}

fn inheritance(name: &'static str) -> ScenarioOutcome {
    let mut h = Harness::new(fixtures::hierarchy());
    let manager = h.insert(
        Entity::new("manager")
            .with("name", "grace")
            .with("salary", 100)
            .with("level", 3),
    );

    let result = h.persist(&[manager]);
    ScenarioOutcome::capture(name, &h, &result)
}

fn cycle(name: &'static str) -> ScenarioOutcome {
    let mut h = Harness::new(fixtures::cyclic());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let post = h.insert(Entity::new("post").with("title", "hello").with_one("author", Some(user)));
    h.entity_mut(user).set_relation("favorite", Related::One(Some(post)));

    let result = h.persist(&[user]);
    ScenarioOutcome::capture(name, &h, &result)
}

/// Stores a user with two posts and forgets the statements that took.
fn seeded(policy: ChildPolicy) -> (Harness, EntityId) {
    let mut h = Harness::new(fixtures::blog_with(policy));
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let posts: Vec<_> = ["hello", "again"]
        .into_iter()
        .map(|title| h.insert(Entity::new("post").with("title", title).with_one("author", Some(user))))
        .collect();
    h.entity_mut(user).set_relation("posts", Related::Many(posts));

    let seeded = h.persist(&[user]);
    assert!(seeded.is_success(), "seeding failed: {:?}", seeded.error());
    h.clear_statements();
    (h, user)
}

fn cascade_delete(name: &'static str) -> ScenarioOutcome {
    let (mut h, user) = seeded(ChildPolicy::Cascade);
    let result = h.delete(&[user], true);
    ScenarioOutcome::capture(name, &h, &result)
}

fn nullify(name: &'static str) -> ScenarioOutcome {
    let (mut h, user) = seeded(ChildPolicy::Nullify);
    let result = h.delete(&[user], true);
    ScenarioOutcome::capture(name, &h, &result)
}

fn blocked_delete(name: &'static str) -> ScenarioOutcome {
    let (mut h, user) = seeded(ChildPolicy::Block);
    let result = h.delete(&[user], false);
    ScenarioOutcome::capture(name, &h, &result)
}

fn rollback(name: &'static str) -> ScenarioOutcome {
    let mut h = Harness::new(fixtures::blog());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let post = h.insert(Entity::new("post").with("title", "hello").with_one("author", Some(user)));
    h.schema.database().fail_next(StatementKind::Insert, "posts");

    let result = h.persist(&[post]);
    ScenarioOutcome::capture(name, &h, &result)
}

fn embedded(name: &'static str) -> ScenarioOutcome {
    let mut h = Harness::new(fixtures::blog());
    let address = h.insert(
        Entity::new("address")
            .with("city", "Dar es Salaam")
            .with("street", "Uhuru"),
    );
    let user = h.insert(Entity::new("user").with("name", "ada").with_one("address", Some(address)));

    let result = h.persist(&[user]);
    ScenarioOutcome::capture(name, &h, &result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = scenarios().iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scenarios().len());
    }

    #[test]
    fn find_by_name() {
        assert_eq!(find("cycle").map(|s| s.name), Some("cycle"));
        assert!(find("missing").is_none());
    }

    #[test]
    fn only_failure_scenarios_fail() {
        for scenario in scenarios() {
            let outcome = scenario.run();
            let expect_success = !matches!(scenario.name, "blocked-delete" | "rollback");
            assert_eq!(outcome.success, expect_success, "{}: {:?}", scenario.name, outcome.error);
        }
    }

    #[test]
    fn outcome_serializes() {
        let outcome = find("blog").unwrap().run();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["name"], "blog");
        assert_eq!(json["success"], true);
        assert!(json["statements"].as_array().unwrap().len() >= 3);
    }
}
