// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A named selection of enabled values across all four dimensions.

use super::dimension::{ConfigurationChangeListener, Dimension, DimensionKind};
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_CONFIGURATION_ID: AtomicU32 = AtomicU32::new(1);

/// The identity of a [`Configuration`].
///
/// User configurations get monotonically assigned ids; the two reserved
/// variants identify the built-in "all compatible devices" and
/// "single default device" configurations.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ConfigurationId {
    /// The built-in configuration matching every compatible device.
    AllCompatible,

    /// The built-in single-device default configuration.
    SingleDeviceDefault,

    /// A user-created configuration.
    User(u32),
}

impl ConfigurationId {
    fn next_user_id() -> Self {
        ConfigurationId::User(NEXT_CONFIGURATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationId::AllCompatible => f.write_str("all-compatible"),
            ConfigurationId::SingleDeviceDefault => f.write_str("single-device-default"),
            ConfigurationId::User(id) => write!(f, "{id}"),
        }
    }
}

/// A matrix configuration: one [`Dimension`] per axis plus identity and
/// display metadata.
///
/// Equality and hashing go by id only. Two configurations with identical
/// selections but different ids are distinct entities.
#[derive(Debug)]
pub struct Configuration {
    id: ConfigurationId,
    name: String,
    editable: bool,
    device: Dimension,
    api_level: Dimension,
    locale: Dimension,
    orientation: Dimension,
}

impl Configuration {
    /// Creates a new editable user configuration with a fresh id.
    pub fn new(
        name: impl Into<String>,
        device: Dimension,
        api_level: Dimension,
        locale: Dimension,
        orientation: Dimension,
    ) -> Self {
        Self::with_id(ConfigurationId::next_user_id(), name, device, api_level, locale, orientation)
    }

    /// Creates a configuration with a reserved id. Reserved configurations
    /// are not editable.
    pub fn new_reserved(
        id: ConfigurationId,
        name: impl Into<String>,
        device: Dimension,
        api_level: Dimension,
        locale: Dimension,
        orientation: Dimension,
    ) -> Self {
        let mut configuration =
            Self::with_id(id, name, device, api_level, locale, orientation);
        configuration.editable = false;
        configuration
    }

    fn with_id(
        id: ConfigurationId,
        name: impl Into<String>,
        device: Dimension,
        api_level: Dimension,
        locale: Dimension,
        orientation: Dimension,
    ) -> Self {
        debug_assert_eq!(device.kind(), DimensionKind::DeviceModel);
        debug_assert_eq!(api_level.kind(), DimensionKind::ApiLevel);
        debug_assert_eq!(locale.kind(), DimensionKind::Locale);
        debug_assert_eq!(orientation.kind(), DimensionKind::Orientation);
        Self {
            id,
            name: name.into(),
            editable: true,
            device,
            api_level,
            locale,
            orientation,
        }
    }

    /// The configuration's id.
    pub fn id(&self) -> ConfigurationId {
        self.id
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the user may edit this configuration.
    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// The four dimensions in canonical order.
    pub fn dimensions(&self) -> [&Dimension; 4] {
        [&self.device, &self.api_level, &self.locale, &self.orientation]
    }

    /// The device-model dimension.
    pub fn device(&self) -> &Dimension {
        &self.device
    }

    /// The device-model dimension, mutably.
    pub fn device_mut(&mut self) -> &mut Dimension {
        &mut self.device
    }

    /// The API-level dimension.
    pub fn api_level(&self) -> &Dimension {
        &self.api_level
    }

    /// The API-level dimension, mutably.
    pub fn api_level_mut(&mut self) -> &mut Dimension {
        &mut self.api_level
    }

    /// The locale dimension.
    pub fn locale(&self) -> &Dimension {
        &self.locale
    }

    /// The locale dimension, mutably.
    pub fn locale_mut(&mut self) -> &mut Dimension {
        &mut self.locale
    }

    /// The orientation dimension.
    pub fn orientation(&self) -> &Dimension {
        &self.orientation
    }

    /// The orientation dimension, mutably.
    pub fn orientation_mut(&mut self) -> &mut Dimension {
        &mut self.orientation
    }

    /// Registers a listener on all four dimensions. Delivery is synchronous,
    /// one notification per logical mutation.
    pub fn subscribe(&mut self, listener: ConfigurationChangeListener) {
        self.device.subscribe(listener.clone());
        self.api_level.subscribe(listener.clone());
        self.locale.subscribe(listener.clone());
        self.orientation.subscribe(listener);
    }

    /// The number of concrete combinations this configuration expands to:
    /// the product of the four enabled-set sizes.
    ///
    /// Zero is a valid, meaningful state signaling "nothing to run".
    pub fn combination_count(&self) -> usize {
        self.dimensions()
            .iter()
            .map(|d| d.enabled_len())
            .product()
    }

    /// Copies this configuration.
    ///
    /// With `prefix == None` this is an identity clone: same id, same name,
    /// used for edit-cancel semantics. With a prefix, the copy is a new
    /// entity: fresh id, name prefixed, editable.
    ///
    /// Listeners are never carried over to the copy.
    pub fn copy(&self, prefix: Option<&str>) -> Configuration {
        let (id, name, editable) = match prefix {
            None => (self.id, self.name.clone(), self.editable),
            Some(prefix) => (
                ConfigurationId::next_user_id(),
                format!("{prefix}{}", self.name),
                true,
            ),
        };
        Self {
            id,
            name,
            editable,
            device: self.device.copy(),
            api_level: self.api_level.copy(),
            locale: self.locale.copy(),
            orientation: self.orientation.copy(),
        }
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Configuration {}

impl Hash for Configuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::test_catalog;
    use pretty_assertions::assert_eq;

    #[test]
    fn combination_count_is_the_product_of_enabled_sizes() {
        let mut configuration = test_catalog::configuration("desk check");
        configuration.device_mut().enable(["N6", "N9"]).unwrap();
        configuration.api_level_mut().enable(["21", "22"]).unwrap();
        configuration.locale_mut().enable(["en"]).unwrap();
        configuration.orientation_mut().enable(["portrait"]).unwrap();
        assert_eq!(configuration.combination_count(), 4);
    }

    #[test]
    fn combination_count_zero_when_any_dimension_is_empty() {
        let mut configuration = test_catalog::configuration("degenerate");
        configuration.device_mut().enable(["N6"]).unwrap();
        configuration.api_level_mut().enable(["21"]).unwrap();
        configuration.locale_mut().enable(["en"]).unwrap();
        // orientation left empty
        assert_eq!(configuration.combination_count(), 0);
    }

    #[test]
    fn identity_clone_keeps_id_and_name() {
        let mut configuration = test_catalog::configuration("original");
        configuration.device_mut().enable(["N6"]).unwrap();
        let clone = configuration.copy(None);
        assert_eq!(clone, configuration);
        assert_eq!(clone.name(), "original");
        assert_eq!(clone.device().enabled_len(), 1);
    }

    #[test]
    fn prefixed_copy_is_a_new_entity() {
        let configuration = test_catalog::configuration("original");
        let copy = configuration.copy(Some("Copy of "));
        assert_ne!(copy, configuration);
        assert_eq!(copy.name(), "Copy of original");
        assert!(copy.is_editable());
    }

    #[test]
    fn equality_goes_by_id_not_content() {
        let a = test_catalog::configuration("same");
        let b = test_catalog::configuration("same");
        assert_ne!(a, b);
    }

    #[test]
    fn user_ids_are_monotonic() {
        let a = test_catalog::configuration("a");
        let b = test_catalog::configuration("b");
        match (a.id(), b.id()) {
            (ConfigurationId::User(a), ConfigurationId::User(b)) => assert!(a < b),
            other => panic!("expected user ids, got {other:?}"),
        }
    }
}
