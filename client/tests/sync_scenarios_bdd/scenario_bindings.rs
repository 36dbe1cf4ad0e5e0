//! Scenario bindings for the sync BDD tests.

use super::*;
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/sync_scenarios.feature",
    name = "Selecting a user fetches their tasks once"
)]
fn selecting_a_user_fetches_their_tasks_once(world: SyncScenarioWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/sync_scenarios.feature",
    name = "Switching users resets the completion filter"
)]
fn switching_users_resets_the_completion_filter(world: SyncScenarioWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/sync_scenarios.feature",
    name = "A failed toggle reverts the task"
)]
fn a_failed_toggle_reverts_the_task(world: SyncScenarioWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/sync_scenarios.feature",
    name = "The server echo replaces the optimistic candidate"
)]
fn the_server_echo_replaces_the_optimistic_candidate(world: SyncScenarioWorld) {
    drop(world);
}
