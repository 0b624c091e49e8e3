//! Per-node derived attributes, written once.
//!
//! The [`EntityStore`] is owned by the simulation driver and handed to
//! readers afterwards. Each table refuses a second write for the same node,
//! which catches traversal bugs instead of silently overwriting state.

use std::collections::HashMap;

use crate::error::{Result, SimError};
use crate::genetics::{Genotype, Infection};

/// A node-keyed table that accepts one record per node.
#[derive(Debug, Clone)]
pub struct WriteOnceTable<T> {
    name: &'static str,
    rows: HashMap<String, T>,
}

impl<T> WriteOnceTable<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: HashMap::new(),
        }
    }

    /// Table name used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Insert the record for `node`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateNode`] if `node` already has a record.
    pub fn insert(&mut self, node: &str, value: T) -> Result<()> {
        if self.rows.contains_key(node) {
            return Err(SimError::DuplicateNode {
                table: self.name,
                node: node.to_string(),
            });
        }
        self.rows.insert(node.to_string(), value);
        Ok(())
    }

    /// Record for `node`, if written.
    #[must_use]
    pub fn get(&self, node: &str) -> Option<&T> {
        self.rows.get(node)
    }

    /// Record for parent `parent`, read while processing `node`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MissingParentState`] if the parent has no record.
    pub fn parent_state(&self, node: &str, parent: &str) -> Result<&T> {
        self.rows
            .get(parent)
            .ok_or_else(|| SimError::MissingParentState {
                table: self.name,
                node: node.to_string(),
                parent: parent.to_string(),
            })
    }

    /// Record for `node`, required by a later pass.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MissingState`] if `node` has no record.
    pub fn state(&self, node: &str) -> Result<&T> {
        self.rows.get(node).ok_or_else(|| SimError::MissingState {
            table: self.name,
            node: node.to_string(),
        })
    }

    /// Number of written records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Derived attribute tables for one simulation run.
#[derive(Debug, Clone)]
pub struct EntityStore {
    pub(crate) infection_times: WriteOnceTable<f64>,
    pub(crate) infection_durations: WriteOnceTable<f64>,
    pub(crate) infections: WriteOnceTable<Infection>,
    pub(crate) observed: WriteOnceTable<Genotype>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self {
            infection_times: WriteOnceTable::new("infection_time"),
            infection_durations: WriteOnceTable::new("infection_duration"),
            infections: WriteOnceTable::new("infection"),
            observed: WriteOnceTable::new("observed_genotype"),
        }
    }
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time at which `node` was infected.
    #[must_use]
    pub fn infection_time(&self, node: &str) -> Option<f64> {
        self.infection_times.get(node).copied()
    }

    /// How long `node` stayed infectious before detection.
    #[must_use]
    pub fn infection_duration(&self, node: &str) -> Option<f64> {
        self.infection_durations.get(node).copied()
    }

    /// `infection_time + infection_duration`, when both are written.
    #[must_use]
    pub fn observation_time(&self, node: &str) -> Option<f64> {
        Some(self.infection_time(node)? + self.infection_duration(node)?)
    }

    /// Latent strains carried by `node`.
    #[must_use]
    pub fn infection(&self, node: &str) -> Option<&Infection> {
        self.infections.get(node)
    }

    /// Noisy observed genotype of `node`.
    #[must_use]
    pub fn observed_genotype(&self, node: &str) -> Option<&Genotype> {
        self.observed.get(node)
    }

    /// Write the timing record for `node`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateNode`] if either value was already written.
    pub fn record_timing(&mut self, node: &str, time: f64, duration: f64) -> Result<()> {
        if self.infection_durations.get(node).is_some() {
            return Err(SimError::DuplicateNode {
                table: self.infection_durations.name(),
                node: node.to_string(),
            });
        }
        self.infection_times.insert(node, time)?;
        self.infection_durations.insert(node, duration)
    }

    /// Write the latent infection for `node`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateNode`] on a second write.
    pub fn record_infection(&mut self, node: &str, infection: Infection) -> Result<()> {
        self.infections.insert(node, infection)
    }

    /// Write the observed genotype for `node`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateNode`] on a second write.
    pub fn record_observation(&mut self, node: &str, genotype: Genotype) -> Result<()> {
        self.observed.insert(node, genotype)
    }

    /// Read-only view of the observed genotype table.
    #[must_use]
    pub const fn observations(&self) -> &WriteOnceTable<Genotype> {
        &self.observed
    }
}
