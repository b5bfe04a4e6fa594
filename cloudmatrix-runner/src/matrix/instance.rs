// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One concrete combination of dimension values, and its two string codecs.
//!
//! A [`ConfigurationInstance`] is the unit of execution and reporting: one
//! value per dimension, in canonical dimension order. The *encoded* form
//! joins the values' stable ids with `-` and doubles as the remote
//! file-naming key; the *display* form joins the human-readable names with
//! `" | "`. Both forms round-trip through parsing. The separators are a
//! compatibility-sensitive contract with the execution backend and must not
//! change.

use super::{configuration::Configuration, dimension::DimensionKind};
use crate::errors::InstanceParseError;
use itertools::Itertools;
use smol_str::SmolStr;

/// Separator between stable value ids in the encoded form.
pub const ENCODED_DELIMITER: &str = "-";

/// Separator between value names in the display form.
pub const DISPLAY_DELIMITER: &str = " | ";

/// Which string form of an instance to produce.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InstanceForm {
    /// Stable ids joined by [`ENCODED_DELIMITER`].
    Encoded,

    /// Human-readable names joined by [`DISPLAY_DELIMITER`].
    Display,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
struct InstanceValue {
    kind: DimensionKind,
    id: SmolStr,
    name: SmolStr,
}

/// One concrete dimension-value combination.
///
/// Equality is structural: two instances are equal when they select the same
/// value for every dimension, regardless of which configuration produced
/// them.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConfigurationInstance {
    // Always in canonical dimension order.
    values: Vec<InstanceValue>,
}

impl ConfigurationInstance {
    /// The encoded form, e.g. `N6-21-en-portrait`.
    pub fn encoded(&self) -> SmolStr {
        SmolStr::new(self.values.iter().map(|v| v.id.as_str()).join(ENCODED_DELIMITER))
    }

    /// The display form, e.g. `Nexus 6 | API 21 | English | Portrait`.
    pub fn display(&self) -> String {
        self.values.iter().map(|v| v.name.as_str()).join(DISPLAY_DELIMITER)
    }

    /// The selected value's stable id for a dimension.
    pub fn value_id(&self, kind: DimensionKind) -> Option<&str> {
        self.values.iter().find(|v| v.kind == kind).map(|v| v.id.as_str())
    }

    /// The selected value's display name for a dimension.
    pub fn value_name(&self, kind: DimensionKind) -> Option<&str> {
        self.values.iter().find(|v| v.kind == kind).map(|v| v.name.as_str())
    }

    /// Parses an encoded instance string against the configuration's full
    /// domains.
    pub fn parse_encoded(
        configuration: &Configuration,
        encoded: &str,
    ) -> Result<Self, InstanceParseError> {
        Self::parse(configuration, encoded, InstanceForm::Encoded)
    }

    /// Parses a display instance string against the configuration's full
    /// domains.
    pub fn parse_display(
        configuration: &Configuration,
        display: &str,
    ) -> Result<Self, InstanceParseError> {
        Self::parse(configuration, display, InstanceForm::Display)
    }

    fn parse(
        configuration: &Configuration,
        input: &str,
        form: InstanceForm,
    ) -> Result<Self, InstanceParseError> {
        let delimiter = match form {
            InstanceForm::Encoded => ENCODED_DELIMITER,
            InstanceForm::Display => DISPLAY_DELIMITER,
        };
        let dimensions = configuration.dimensions();
        let tokens: Vec<&str> = input.split(delimiter).collect();
        if tokens.len() != dimensions.len() {
            return Err(InstanceParseError::WrongValueCount {
                input: input.to_owned(),
                delimiter,
                expected: dimensions.len(),
                actual: tokens.len(),
            });
        }

        let mut values = Vec::with_capacity(dimensions.len());
        for (dimension, token) in dimensions.iter().zip(tokens) {
            let value = match form {
                InstanceForm::Encoded => dimension.value_with_id(token),
                InstanceForm::Display => dimension.value_named(token),
            };
            let value = value.ok_or_else(|| InstanceParseError::UnknownToken {
                dimension: dimension.kind(),
                token: token.to_owned(),
            })?;
            values.push(InstanceValue {
                kind: dimension.kind(),
                id: SmolStr::new(value.id()),
                name: SmolStr::new(value.name()),
            });
        }
        Ok(Self { values })
    }
}

/// Expands a configuration into its concrete instances.
///
/// Enumeration is depth-first over the dimensions in canonical order, and
/// within each dimension follows enable order. The resulting order is the
/// order in which instances are scheduled and reported, and is stable across
/// repeated calls for the same enabled sets.
pub fn expand_instances(configuration: &Configuration) -> Vec<ConfigurationInstance> {
    let dimensions = configuration.dimensions();
    let mut instances = Vec::with_capacity(configuration.combination_count());
    let mut stack = Vec::with_capacity(dimensions.len());
    expand_into(&dimensions, 0, &mut stack, &mut instances);
    instances
}

fn expand_into(
    dimensions: &[&super::dimension::Dimension; 4],
    depth: usize,
    stack: &mut Vec<InstanceValue>,
    out: &mut Vec<ConfigurationInstance>,
) {
    if depth == dimensions.len() {
        out.push(ConfigurationInstance { values: stack.clone() });
        return;
    }
    let dimension = dimensions[depth];
    for value in dimension.enabled() {
        stack.push(InstanceValue {
            kind: dimension.kind(),
            id: SmolStr::new(value.id()),
            name: SmolStr::new(value.name()),
        });
        expand_into(dimensions, depth + 1, stack, out);
        stack.pop();
    }
}

/// Expands a configuration directly into instance strings of the given form.
pub fn compute_configuration_instances(
    configuration: &Configuration,
    form: InstanceForm,
) -> Vec<String> {
    expand_instances(configuration)
        .iter()
        .map(|instance| match form {
            InstanceForm::Encoded => instance.encoded().to_string(),
            InstanceForm::Display => instance.display(),
        })
        .collect()
}
