//! Variable storage and lookup.
//!
//! Factors read their current estimates through the [`ValueLookup`] trait, so any
//! container can back a linearization. [`Values`] is the in-memory implementation.

use std::collections::HashMap;

use nalgebra::Vector3;

use crate::core::key::Key;
use crate::error::{TriangulationError, TriangulationResult};
use crate::geometry::Pose3;

/// Read access to current variable estimates.
pub trait ValueLookup {
    /// Current estimate of a 3D point.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if the key is absent, `TypeMismatch` if it holds another type.
    fn point3(&self, key: Key) -> TriangulationResult<Vector3<f64>>;

    fn contains(&self, key: Key) -> bool;
}

/// Value types the store can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableValue {
    /// 3D point (landmark)
    Point3(Vector3<f64>),
    /// Rigid body pose
    Pose3(Pose3),
}

impl VariableValue {
    /// Tangent space size of the value
    pub fn dim(&self) -> usize {
        match self {
            VariableValue::Point3(_) => 3,
            VariableValue::Pose3(_) => 6,
        }
    }
}

impl From<Vector3<f64>> for VariableValue {
    fn from(point: Vector3<f64>) -> Self {
        VariableValue::Point3(point)
    }
}

impl From<Pose3> for VariableValue {
    fn from(pose: Pose3) -> Self {
        VariableValue::Pose3(pose)
    }
}

/// Keyed collection of variable estimates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values {
    values: HashMap<Key, VariableValue>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new value.
    ///
    /// # Errors
    ///
    /// `KeyAlreadyExists` if `key` is already in use; use [`Values::update`] instead.
    pub fn insert(
        &mut self,
        key: impl Into<Key>,
        value: impl Into<VariableValue>,
    ) -> TriangulationResult<()> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(TriangulationError::KeyAlreadyExists(key));
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    /// Replace an existing value.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if `key` is not present.
    pub fn update(
        &mut self,
        key: impl Into<Key>,
        value: impl Into<VariableValue>,
    ) -> TriangulationResult<()> {
        let key = key.into();
        match self.values.get_mut(&key) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(TriangulationError::KeyNotFound(key)),
        }
    }

    pub fn get(&self, key: Key) -> Option<&VariableValue> {
        self.values.get(&key)
    }

    /// Current estimate of a pose.
    pub fn pose3(&self, key: Key) -> TriangulationResult<&Pose3> {
        match self.values.get(&key) {
            Some(VariableValue::Pose3(pose)) => Ok(pose),
            Some(_) => Err(TriangulationError::TypeMismatch {
                key,
                expected: "Pose3",
            }),
            None => Err(TriangulationError::KeyNotFound(key)),
        }
    }

    pub fn remove(&mut self, key: Key) -> Option<VariableValue> {
        self.values.remove(&key)
    }

    /// Keys in ascending order
    pub fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.values.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum of tangent dimensions of all values
    pub fn dim(&self) -> usize {
        self.values.values().map(VariableValue::dim).sum()
    }
}

impl ValueLookup for Values {
    fn point3(&self, key: Key) -> TriangulationResult<Vector3<f64>> {
        match self.values.get(&key) {
            Some(VariableValue::Point3(point)) => Ok(*point),
            Some(_) => Err(TriangulationError::TypeMismatch {
                key,
                expected: "Point3",
            }),
            None => Err(TriangulationError::KeyNotFound(key)),
        }
    }

    fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }
}
