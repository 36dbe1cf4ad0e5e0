//! User records as returned by the remote directory.
//!
//! Users are immutable once decoded; identity is the `id` field.

use super::ids::UserId;

/// Geographic coordinates exactly as the API reports them (decimal text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geo {
    /// Latitude.
    pub lat: String,
    /// Longitude.
    pub lng: String,
}

/// Postal address of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Street name.
    pub street: String,
    /// Suite or apartment.
    pub suite: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub zipcode: String,
    /// Coordinates of the address.
    pub geo: Geo,
}

/// Employer details of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    /// Company name.
    pub name: String,
    /// Marketing tag line.
    pub catch_phrase: String,
    /// Business summary.
    pub bs: String,
}

/// A remote user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Full display name.
    pub name: String,
    /// Login handle.
    pub username: String,
    /// Contact e-mail.
    pub email: String,
    /// Postal address.
    pub address: Address,
    /// Phone number, free-form.
    pub phone: String,
    /// Personal website, free-form.
    pub website: String,
    /// Employer.
    pub company: Company,
}

/// Sort users by name, ignoring case. The sort is stable so users whose
/// names compare equal keep the order the server sent them in.
pub fn sort_by_name(users: &mut [User]) {
    users.sort_by_cached_key(|user| user.name.to_lowercase());
}
