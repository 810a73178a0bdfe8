//! In-memory person store
//!
//! The alternate backend for running without a database file. The record
//! list is owned by the store and guarded by an RwLock; it lives only for
//! the lifetime of the process.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use mflix_types::{Person, PersonInput, PersonPatch};

use super::{PersonStore, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Person>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Person>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Person>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn make_person(input: PersonInput) -> Person {
        Person {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            email: input.email,
            password: input.password,
            phone: input.phone,
            address: input.address,
            birth_date: input.birth_date,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PersonStore for MemoryStore {
    async fn insert(&self, input: PersonInput) -> StoreResult<Person> {
        let mut records = self.write();
        if records.iter().any(|p| p.email == input.email) {
            return Err(StoreError::DuplicateEmail(input.email));
        }

        let person = Self::make_person(input);
        records.push(person.clone());
        Ok(person)
    }

    async fn insert_many(&self, inputs: Vec<PersonInput>) -> StoreResult<usize> {
        let mut records = self.write();

        // Reject the whole batch before touching the list
        for (i, input) in inputs.iter().enumerate() {
            let dup_stored = records.iter().any(|p| p.email == input.email);
            let dup_in_batch = inputs[..i].iter().any(|other| other.email == input.email);
            if dup_stored || dup_in_batch {
                return Err(StoreError::DuplicateEmail(input.email.clone()));
            }
        }

        let inserted = inputs.len();
        records.extend(inputs.into_iter().map(Self::make_person));
        Ok(inserted)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Person>> {
        Ok(self.read().iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Person>> {
        Ok(self.read().clone())
    }

    async fn update(&self, id: &str, input: PersonInput) -> StoreResult<()> {
        let mut records = self.write();

        if records
            .iter()
            .any(|p| p.email == input.email && p.id != id)
        {
            return Err(StoreError::DuplicateEmail(input.email));
        }

        let person = records
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;

        person.name = input.name;
        person.email = input.email;
        person.password = input.password;
        person.phone = input.phone;
        person.address = input.address;
        person.birth_date = input.birth_date;
        Ok(())
    }

    async fn merge(&self, email: &str, patch: PersonPatch) -> StoreResult<Person> {
        let patch = patch.normalized();
        let mut records = self.write();

        let person = records
            .iter_mut()
            .find(|p| p.email == email)
            .ok_or(StoreError::NotFound)?;

        if let Some(name) = patch.name {
            person.name = name;
        }
        if let Some(password) = patch.password {
            person.password = password;
        }
        if let Some(phone) = patch.phone {
            person.phone = Some(phone);
        }
        if let Some(address) = patch.address {
            person.address = Some(address);
        }
        if let Some(birth_date) = patch.birth_date {
            person.birth_date = Some(birth_date);
        }

        Ok(person.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut records = self.write();
        let before = records.len();
        records.retain(|p| p.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_email(&self, email: &str) -> StoreResult<()> {
        let mut records = self.write();
        let before = records.len();
        records.retain(|p| p.email != email);
        if records.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<u64> {
        let mut records = self.write();
        let deleted = records.len() as u64;
        records.clear();
        Ok(deleted)
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<Person>> {
        let needle = query.to_lowercase();
        Ok(self
            .read()
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.read().len() as u64)
    }
}
