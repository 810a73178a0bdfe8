//! Person record types

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A stored person record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Insert / full-overwrite payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonInput {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// Partial-update payload, keyed by email.
///
/// Absent or empty fields leave the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl PersonPatch {
    /// Collapse empty strings to `None` so they cannot blank out stored values
    pub fn normalized(self) -> Self {
        fn keep(field: Option<String>) -> Option<String> {
            field.filter(|s| !s.trim().is_empty())
        }

        Self {
            name: keep(self.name),
            password: keep(self.password),
            phone: keep(self.phone),
            address: keep(self.address),
            birth_date: self.birth_date,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.password.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.birth_date.is_none()
    }
}

/// The `{id, name, email}` projection returned by list, search and export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&Person> for PersonSummary {
    fn from(p: &Person) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            email: p.email.clone(),
        }
    }
}

impl From<Person> for PersonSummary {
    fn from(p: Person) -> Self {
        Self {
            id: p.id,
            name: p.name,
            email: p.email,
        }
    }
}

/// Age on `today`, derived from the birth date. Never stored.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}
