//! Record builders for tests.

use crate::domain::{Address, Company, Geo, Task, TaskId, User, UserId};

/// Build a user with placeholder contact details.
///
/// # Panics
///
/// Panics when `id` is zero.
pub fn user(id: u64, name: &str) -> User {
    User {
        id: UserId::new(id).unwrap_or_else(|error| panic!("fixture user id: {error}")),
        name: name.to_owned(),
        username: name.to_lowercase().replace(' ', "."),
        email: format!("user{id}@example.test"),
        address: Address {
            street: "Kulas Light".to_owned(),
            suite: "Apt. 556".to_owned(),
            city: "Gwenborough".to_owned(),
            zipcode: "92998-3874".to_owned(),
            geo: Geo {
                lat: "-37.3159".to_owned(),
                lng: "81.1496".to_owned(),
            },
        },
        phone: "1-770-736-8031".to_owned(),
        website: "example.test".to_owned(),
        company: Company {
            name: "Romaguera-Crona".to_owned(),
            catch_phrase: "Multi-layered client-server neural-net".to_owned(),
            bs: "harness real-time e-markets".to_owned(),
        },
    }
}

/// Build a task titled after its id.
///
/// # Panics
///
/// Panics when `id` or `user_id` is zero.
pub fn task(id: u64, user_id: u64, completed: bool) -> Task {
    Task {
        id: TaskId::new(id).unwrap_or_else(|error| panic!("fixture task id: {error}")),
        user_id: UserId::new(user_id).unwrap_or_else(|error| panic!("fixture user id: {error}")),
        title: format!("task {id}"),
        completed,
    }
}
