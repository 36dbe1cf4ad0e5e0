//! Step definitions for the sync BDD tests.

use std::time::Duration;

use httpmock::prelude::*;
use rstest_bdd_macros::{given, then, when};
use serde_json::Value;
use taskboard::domain::ports::FetchError;
use taskboard::domain::{NoticeKind, SelectedTasks, ToggleError};
use taskboard::test_support::fixtures::task;

use super::*;

const USERS: [(u64, &str); 10] = [
    (1, "Leanne Graham"),
    (2, "Ervin Howell"),
    (3, "Clementine Bauch"),
    (4, "Patricia Lebsack"),
    (5, "Chelsey Dietrich"),
    (6, "Mrs. Dennis Schulist"),
    (7, "Kurtis Weissnat"),
    (8, "Nicholas Runolfsdottir V"),
    (9, "Glenna Reichert"),
    (10, "Clementina DuBuque"),
];

// -----------------------------------------------------------------------------
// Given Steps
// -----------------------------------------------------------------------------

#[given("an API listing ten users where Clementine Bauch owns two tasks")]
fn an_api_listing_ten_users(world: &SyncScenarioWorld) {
    let server = world.server();
    let users: Vec<Value> = USERS
        .iter()
        .map(|(id, name)| user_json(*id, name))
        .collect();
    server.mock(|when, then| {
        when.method(GET).path("/users");
        then.status(200).json_body(Value::Array(users));
    });
    server.mock(|when, then| {
        when.method(GET).path("/users/3/todos");
        then.status(200)
            .delay(Duration::from_millis(100))
            .json_body(json!([
                task_json(2, 3, true),
                task_json(1, 3, false),
                task_json(9, 4, false)
            ]));
    });
    world.start_app(Duration::from_secs(5));
}

#[given("an API where users 1 and 2 each own an open and a completed task")]
fn an_api_with_two_users_of_mixed_tasks(world: &SyncScenarioWorld) {
    let server = world.server();
    server.mock(|when, then| {
        when.method(GET).path("/users/1/todos");
        then.status(200)
            .json_body(json!([task_json(1, 1, false), task_json(2, 1, true)]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/users/2/todos");
        then.status(200)
            .json_body(json!([task_json(3, 2, true), task_json(4, 2, false)]));
    });
    world.start_app(Duration::from_secs(5));
}

#[given("an API whose update of task 1 outlasts the request timeout")]
fn an_api_with_a_slow_update(world: &SyncScenarioWorld) {
    let server = world.server();
    server.mock(|when, then| {
        when.method(GET).path("/users/1/todos");
        then.status(200)
            .json_body(json!([task_json(1, 1, false), task_json(2, 1, true)]));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/todos/1");
        then.status(200)
            .delay(Duration::from_secs(2))
            .json_body(task_json(1, 1, true));
    });
    world.start_app(Duration::from_millis(200));
    world.preload_tasks(user_id(1));
}

#[given("an API that echoes task 2 as incomplete")]
fn an_api_echoing_task_two_incomplete(world: &SyncScenarioWorld) {
    let server = world.server();
    server.mock(|when, then| {
        when.method(GET).path("/users/1/todos");
        then.status(200)
            .json_body(json!([task_json(1, 1, false), task_json(2, 1, true)]));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/todos/2");
        then.status(200).json_body(task_json(2, 1, false));
    });
    world.start_app(Duration::from_secs(5));
    world.preload_tasks(user_id(1));
}

// -----------------------------------------------------------------------------
// When Steps
// -----------------------------------------------------------------------------

#[when("the operator loads the users")]
fn the_operator_loads_the_users(world: &SyncScenarioWorld) {
    let app = world.app();
    let users = world
        .block_on(app.coordinator.users())
        .expect("users load");
    world.users.set(users);
}

#[when("the operator selects the third user alphabetically")]
fn the_operator_selects_the_third_user(world: &SyncScenarioWorld) {
    let users = world.users.get().expect("users should be loaded");
    let third = users[2].id;
    world.app().selection.select(third).expect("select");
    world.selected_user.set(third);
}

#[when("the list and detail views read the selected tasks together")]
fn the_list_and_detail_views_read_together(world: &SyncScenarioWorld) {
    let app = world.app();
    let user = world.selected_user.get().expect("user should be selected");
    let (list, detail) = world.block_on(async {
        tokio::join!(
            app.coordinator.selected_tasks(),
            app.coordinator.tasks_for(user)
        )
    });
    world.list_view.set(list);
    world.detail_view.set(detail);
}

#[when("the operator selects user 1 and hides completed tasks")]
fn the_operator_selects_user_one_and_hides_completed(world: &SyncScenarioWorld) {
    let app = world.app();
    app.selection.select(user_id(1)).expect("select");
    app.selection.set_hide_completed(true).expect("hide");
}

#[when("the operator reads the selected tasks")]
fn the_operator_reads_the_selected_tasks(world: &SyncScenarioWorld) {
    let app = world.app();
    let view = world.block_on(app.coordinator.selected_tasks());
    world.filtered_view.set(view);
}

#[when("the operator selects user 2")]
fn the_operator_selects_user_two(world: &SyncScenarioWorld) {
    world.app().selection.select(user_id(2)).expect("switch");
}

#[when("the operator reads the selected tasks again")]
fn the_operator_reads_the_selected_tasks_again(world: &SyncScenarioWorld) {
    let app = world.app();
    let view = world.block_on(app.coordinator.selected_tasks());
    world.list_view.set(view);
}

#[when("the operator toggles task 1")]
fn the_operator_toggles_task_one(world: &SyncScenarioWorld) {
    world.toggle(task(1, 1, false));
}

#[when("the operator toggles task 2")]
fn the_operator_toggles_task_two(world: &SyncScenarioWorld) {
    world.toggle(task(2, 1, true));
}

// -----------------------------------------------------------------------------
// Then Steps
// -----------------------------------------------------------------------------

#[then("the users are sorted by name")]
fn the_users_are_sorted_by_name(world: &SyncScenarioWorld) {
    let users = world.users.get().expect("users should be loaded");
    let names: Vec<&str> = users.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Chelsey Dietrich",
            "Clementina DuBuque",
            "Clementine Bauch",
            "Ervin Howell",
            "Glenna Reichert",
            "Kurtis Weissnat",
            "Leanne Graham",
            "Mrs. Dennis Schulist",
            "Nicholas Runolfsdottir V",
            "Patricia Lebsack",
        ]
    );
}

#[then("exactly one tasks request was sent")]
fn exactly_one_tasks_request_was_sent(world: &SyncScenarioWorld) {
    assert_eq!(world.api().task_calls(), 1);
}

#[then("both views show the selected user's own tasks sorted by id")]
fn both_views_show_the_selected_users_tasks(world: &SyncScenarioWorld) {
    let user = world.selected_user.get().expect("user should be selected");
    assert_eq!(user, user_id(3));
    let expected = vec![task(1, 3, false), task(2, 3, true)];
    let list = world.list_view.get().expect("list view should be read");
    assert_eq!(
        list.expect("list view loads"),
        SelectedTasks::Loaded {
            user,
            tasks: expected.clone(),
        }
    );
    let detail = world.detail_view.get().expect("detail view should be read");
    assert_eq!(detail.expect("detail view loads"), expected);
}

#[then("the address records the selected user")]
fn the_address_records_the_selected_user(world: &SyncScenarioWorld) {
    assert_eq!(
        world.app().address_bar.current().as_str(),
        "http://localhost/board?selectedUser=3"
    );
}

#[then("only the open task of user 1 was visible")]
fn only_the_open_task_of_user_one_was_visible(world: &SyncScenarioWorld) {
    let view = world.filtered_view.get().expect("first view should be read");
    assert_eq!(
        view.expect("tasks load"),
        SelectedTasks::Loaded {
            user: user_id(1),
            tasks: vec![task(1, 1, false)],
        }
    );
}

#[then("the completion filter is off")]
fn the_completion_filter_is_off(world: &SyncScenarioWorld) {
    let state = world.app().selection.current();
    assert_eq!(state.selected_user(), Some(user_id(2)));
    assert!(!state.hide_completed());
}

#[then("both tasks of user 2 are visible")]
fn both_tasks_of_user_two_are_visible(world: &SyncScenarioWorld) {
    let view = world.list_view.get().expect("second view should be read");
    assert_eq!(
        view.expect("tasks load"),
        SelectedTasks::Loaded {
            user: user_id(2),
            tasks: vec![task(3, 2, true), task(4, 2, false)],
        }
    );
}

#[then("task 1 was shown completed before the update settled")]
fn task_one_was_shown_completed_early(world: &SyncScenarioWorld) {
    let optimistic = world
        .optimistic
        .get()
        .expect("optimistic list should be recorded");
    assert_eq!(optimistic, vec![task(1, 1, true), task(2, 1, true)]);
}

#[then("the toggle fails with a network error")]
fn the_toggle_fails_with_a_network_error(world: &SyncScenarioWorld) {
    let outcome = world.toggle_result.get().expect("toggle should settle");
    assert!(
        matches!(outcome, Err(ToggleError::Remote(FetchError::Network { .. }))),
        "unexpected outcome: {outcome:?}"
    );
    assert_eq!(world.api().put_calls(), 1, "writes are never retried");
}

#[then("the task list is restored to its state before the toggle")]
fn the_task_list_is_restored(world: &SyncScenarioWorld) {
    let before = world.tasks_before.get().expect("tasks should be preloaded");
    let entry = world.app().coordinator.tasks_entry(user_id(1));
    assert_eq!(entry.data, Some(before));
    assert!(entry.refresh_requested);
}

#[then("an error notice is raised")]
fn an_error_notice_is_raised(world: &SyncScenarioWorld) {
    let notices = world.app().coordinator.notices().snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Error);
    assert!(notices[0].message.contains("task 1"));
}

#[then("the toggle settles with the echoed task")]
fn the_toggle_settles_with_the_echoed_task(world: &SyncScenarioWorld) {
    let outcome = world.toggle_result.get().expect("toggle should settle");
    assert_eq!(outcome, Ok(task(2, 1, false)));
}

#[then("the cached task 2 is incomplete")]
fn the_cached_task_two_is_incomplete(world: &SyncScenarioWorld) {
    let entry = world.app().coordinator.tasks_entry(user_id(1));
    assert_eq!(entry.data, Some(vec![task(1, 1, false), task(2, 1, false)]));
}

#[then("an informational notice says changes are not stored")]
fn an_informational_notice_says_changes_are_not_stored(world: &SyncScenarioWorld) {
    let notices = world.app().coordinator.notices().snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Info);
    assert!(notices[0].message.contains("does not store changes"));
}
