// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The four axes of a matrix configuration.
//!
//! A [`Dimension`] tracks three sets of values: the *full domain* (every
//! value the dimension has ever known), the *supported subset* (values the
//! execution backend currently accepts), and the *enabled subset* (values
//! the user has selected). The enabled subset is never null but may be
//! empty, in which case the owning configuration expands to zero
//! combinations.

use crate::errors::UnknownDimensionValue;
use debug_ignore::DebugIgnore;
use indexmap::IndexSet;
use smol_str::SmolStr;
use std::{fmt, sync::Arc};

/// The kind of a dimension.
///
/// The order of the variants is the canonical dimension order used for
/// instance encoding and Cartesian expansion.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum DimensionKind {
    /// The device model, e.g. `N6`.
    DeviceModel,

    /// The OS API level, e.g. `21`.
    ApiLevel,

    /// The locale, e.g. `en`.
    Locale,

    /// The screen orientation, e.g. `portrait`.
    Orientation,
}

impl DimensionKind {
    /// All dimension kinds in canonical order.
    pub const CANONICAL_ORDER: [DimensionKind; 4] = [
        DimensionKind::DeviceModel,
        DimensionKind::ApiLevel,
        DimensionKind::Locale,
        DimensionKind::Orientation,
    ];
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DimensionKind::DeviceModel => "device model",
            DimensionKind::ApiLevel => "API level",
            DimensionKind::Locale => "locale",
            DimensionKind::Orientation => "orientation",
        };
        f.write_str(s)
    }
}

/// One value in a dimension's domain.
///
/// The `id` is the stable identifier used in encoded instance strings and
/// remote file names; the `name` is the human-readable form used in display
/// strings. Neither may contain the respective join delimiter (`-` for ids,
/// `" | "` for names) -- ids double as remote path segments.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DimensionValue {
    id: SmolStr,
    name: SmolStr,
}

impl DimensionValue {
    /// Creates a new dimension value.
    pub fn new(id: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        let id = id.into();
        let name = name.into();
        debug_assert!(!id.contains('-'), "value id `{id}` contains the encoded delimiter");
        Self { id, name }
    }

    /// The stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A listener invoked synchronously after every logical mutation of a
/// dimension's enabled subset.
///
/// Listeners must not re-enter the dimension that is notifying them.
pub type ConfigurationChangeListener = Arc<dyn Fn(DimensionKind) + Send + Sync>;

/// One axis of a matrix configuration.
#[derive(Debug)]
pub struct Dimension {
    kind: DimensionKind,
    domain: Vec<DimensionValue>,
    supported: IndexSet<SmolStr>,
    enabled: IndexSet<SmolStr>,
    listeners: DebugIgnore<Vec<ConfigurationChangeListener>>,
}

impl Dimension {
    /// Creates a dimension with the given full domain. Every value starts
    /// out supported and none start out enabled.
    pub fn new(kind: DimensionKind, domain: Vec<DimensionValue>) -> Self {
        let supported = domain.iter().map(|v| v.id.clone()).collect();
        Self {
            kind,
            domain,
            supported,
            enabled: IndexSet::new(),
            listeners: DebugIgnore(Vec::new()),
        }
    }

    /// The kind of this dimension.
    pub fn kind(&self) -> DimensionKind {
        self.kind
    }

    /// The full domain, in catalog order.
    pub fn domain(&self) -> &[DimensionValue] {
        &self.domain
    }

    /// The values the backend currently accepts.
    pub fn supported(&self) -> impl Iterator<Item = &DimensionValue> + '_ {
        self.domain.iter().filter(|v| self.supported.contains(&v.id))
    }

    /// Replaces the supported subset. Every id must be in the full domain.
    ///
    /// The enabled subset is left untouched: a user selection of a value the
    /// backend has stopped advertising surfaces at submit time, not here.
    pub fn set_supported<I, S>(&mut self, ids: I) -> Result<(), UnknownDimensionValue>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut supported = IndexSet::new();
        for id in ids {
            let value = self.value_with_id(id.as_ref()).ok_or_else(|| {
                UnknownDimensionValue::new(self.kind, id.as_ref())
            })?;
            supported.insert(SmolStr::new(value.id()));
        }
        self.supported = supported;
        Ok(())
    }

    /// The enabled values, in the order they were enabled.
    pub fn enabled(&self) -> Vec<&DimensionValue> {
        self.enabled
            .iter()
            .filter_map(|id| self.value_with_id(id))
            .collect()
    }

    /// The number of enabled values.
    pub fn enabled_len(&self) -> usize {
        self.enabled.len()
    }

    /// Enables the given values, firing one configuration-changed
    /// notification if the enabled subset changed.
    pub fn enable<I, S>(&mut self, ids: I) -> Result<(), UnknownDimensionValue>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changed = false;
        for id in ids {
            let id = id.as_ref();
            if self.value_with_id(id).is_none() {
                return Err(UnknownDimensionValue::new(self.kind, id));
            }
            changed |= self.enabled.insert(SmolStr::new(id));
        }
        if changed {
            self.notify();
        }
        Ok(())
    }

    /// Disables a single value, firing one notification if it was enabled.
    pub fn disable(&mut self, id: &str) -> Result<(), UnknownDimensionValue> {
        if self.value_with_id(id).is_none() {
            return Err(UnknownDimensionValue::new(self.kind, id));
        }
        // shift_remove keeps the enable order of the remaining values.
        if self.enabled.shift_remove(id) {
            self.notify();
        }
        Ok(())
    }

    /// Enables every supported value.
    pub fn enable_all(&mut self) {
        let mut changed = false;
        let supported: Vec<SmolStr> = self.supported.iter().cloned().collect();
        for id in supported {
            changed |= self.enabled.insert(id);
        }
        if changed {
            self.notify();
        }
    }

    /// Disables every value.
    pub fn disable_all(&mut self) {
        if !self.enabled.is_empty() {
            self.enabled.clear();
            self.notify();
        }
    }

    /// Looks up a domain value by stable id.
    pub fn value_with_id(&self, id: &str) -> Option<&DimensionValue> {
        self.domain.iter().find(|v| v.id == id)
    }

    /// Looks up a domain value by display name.
    pub fn value_named(&self, name: &str) -> Option<&DimensionValue> {
        self.domain.iter().find(|v| v.name == name)
    }

    /// Registers a listener for enabled-subset mutations. Delivery is
    /// synchronous, after the mutation has been applied.
    pub fn subscribe(&mut self, listener: ConfigurationChangeListener) {
        self.listeners.push(listener);
    }

    /// Clones the dimension's data without carrying its listeners over.
    pub(crate) fn copy(&self) -> Dimension {
        Self {
            kind: self.kind,
            domain: self.domain.clone(),
            supported: self.supported.clone(),
            enabled: self.enabled.clone(),
            listeners: DebugIgnore(Vec::new()),
        }
    }

    fn notify(&self) {
        for listener in self.listeners.iter() {
            listener(self.kind);
        }
    }
}
