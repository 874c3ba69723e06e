use std::{
    collections::{HashMap, hash_map::Entry},
    fmt::Display,
    hash::Hash,
};

use crate::error::RegistryError;

/// Read-only table of compiled specializations keyed by their traits.
///
/// Lookup is an exact match on the whole key: there is no fallback to a
/// neighbouring specialization.
#[derive(Debug)]
pub struct Registry<T, K> {
    entries: HashMap<T, K>,
}

impl<T, K> Registry<T, K>
where
    T: Eq + Hash + Display,
{
    pub fn from_entries(entries: impl IntoIterator<Item = (T, K)>) -> Result<Self, RegistryError> {
        let mut map = HashMap::new();
        for (traits, kernel) in entries {
            match map.entry(traits) {
                Entry::Occupied(entry) => {
                    return Err(RegistryError::DuplicateSpecialization(entry.key().to_string()));
                },
                Entry::Vacant(entry) => {
                    entry.insert(kernel);
                },
            }
        }
        Ok(Self {
            entries: map,
        })
    }

    pub fn get(
        &self,
        traits: &T,
    ) -> Option<&K> {
        self.entries.get(traits)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &T> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, &K)> {
        self.entries.iter()
    }
}

impl<T, K> Default for Registry<T, K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}
