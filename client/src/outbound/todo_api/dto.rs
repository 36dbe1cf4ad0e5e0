//! DTOs for the users/todos JSON payloads.
//!
//! Bodies are decoded into a `serde_json::Value` first so each element can be
//! decoded on its own. Elements go through `serde_path_to_error`, so a
//! failure is reported with the full JSON path of the mismatch
//! (`$[3].address.geo.lat`). DTOs are then mapped into domain records in one
//! pass.

use std::fmt::Write as _;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_path_to_error::{Path, Segment};

use crate::domain::ports::FetchError;
use crate::domain::{Address, Company, Geo, Task, TaskId, User, UserId};

#[derive(Debug, Deserialize)]
pub(super) struct GeoDto {
    lat: String,
    lng: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct AddressDto {
    street: String,
    suite: String,
    city: String,
    zipcode: String,
    geo: GeoDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CompanyDto {
    name: String,
    catch_phrase: String,
    bs: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserDto {
    id: u64,
    name: String,
    username: String,
    email: String,
    address: AddressDto,
    phone: String,
    website: String,
    company: CompanyDto,
}

/// Wire shape of a task, both decoded and sent as a `PUT` body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TaskDto {
    id: u64,
    user_id: u64,
    title: String,
    completed: bool,
}

impl From<&Task> for TaskDto {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.get(),
            user_id: task.user_id.get(),
            title: task.title.clone(),
            completed: task.completed,
        }
    }
}

impl UserDto {
    fn into_domain(self, path: &str) -> Result<User, FetchError> {
        let id = UserId::new(self.id)
            .map_err(|error| FetchError::validation(format!("{path}.id"), error.to_string()))?;
        Ok(User {
            id,
            name: self.name,
            username: self.username,
            email: self.email,
            address: Address {
                street: self.address.street,
                suite: self.address.suite,
                city: self.address.city,
                zipcode: self.address.zipcode,
                geo: Geo {
                    lat: self.address.geo.lat,
                    lng: self.address.geo.lng,
                },
            },
            phone: self.phone,
            website: self.website,
            company: Company {
                name: self.company.name,
                catch_phrase: self.company.catch_phrase,
                bs: self.company.bs,
            },
        })
    }
}

impl TaskDto {
    fn into_domain(self, path: &str) -> Result<Task, FetchError> {
        let id = TaskId::new(self.id)
            .map_err(|error| FetchError::validation(format!("{path}.id"), error.to_string()))?;
        let user_id = UserId::new(self.user_id)
            .map_err(|error| FetchError::validation(format!("{path}.userId"), error.to_string()))?;
        Ok(Task {
            id,
            user_id,
            title: self.title,
            completed: self.completed,
        })
    }
}

/// Decode a users array.
pub(super) fn parse_users(body: &[u8]) -> Result<Vec<User>, FetchError> {
    parse_array(body, |dto: UserDto, path| dto.into_domain(path))
}

/// Decode a tasks array.
pub(super) fn parse_tasks(body: &[u8]) -> Result<Vec<Task>, FetchError> {
    parse_array(body, |dto: TaskDto, path| dto.into_domain(path))
}

/// Decode a single task object.
pub(super) fn parse_task(body: &[u8]) -> Result<Task, FetchError> {
    let value = parse_json(body)?;
    decode_element(value, "$", |dto: TaskDto, path| dto.into_domain(path))
}

fn parse_json(body: &[u8]) -> Result<Value, FetchError> {
    serde_json::from_slice(body)
        .map_err(|error| FetchError::validation("$", format!("invalid JSON payload: {error}")))
}

fn parse_array<D, T>(
    body: &[u8],
    into_domain: impl Fn(D, &str) -> Result<T, FetchError>,
) -> Result<Vec<T>, FetchError>
where
    D: DeserializeOwned,
{
    let Value::Array(elements) = parse_json(body)? else {
        return Err(FetchError::validation("$", "expected a JSON array"));
    };
    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| decode_element(element, &format!("$[{index}]"), &into_domain))
        .collect()
}

fn decode_element<D, T>(
    element: Value,
    path: &str,
    into_domain: impl Fn(D, &str) -> Result<T, FetchError>,
) -> Result<T, FetchError>
where
    D: DeserializeOwned,
{
    let dto = serde_path_to_error::deserialize(element).map_err(|error| {
        let at = join_path(path, error.path());
        FetchError::validation(at, error.into_inner().to_string())
    })?;
    into_domain(dto, path)
}

/// Append the segments of a nested path to an element prefix.
fn join_path(prefix: &str, nested: &Path) -> String {
    let mut joined = prefix.to_owned();
    for segment in nested.iter() {
        // Writing to a String cannot fail.
        let _ = match segment {
            Segment::Seq { index } => write!(joined, "[{index}]"),
            Segment::Map { key } => write!(joined, ".{key}"),
            Segment::Enum { variant } => write!(joined, ".{variant}"),
            Segment::Unknown => write!(joined, ".?"),
        };
    }
    joined
}
