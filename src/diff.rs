//! Minimal enable/disable diff for function activation.
//!
//! Agent loading reconciles the current activation set to a target set
//! without discarding definitions and without the disable-all-then-enable
//! churn that would transiently drop tool registrations a live connector
//! may be observing.

use std::collections::BTreeSet;

/// The operations needed to move the current activation set to `required`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivationDiff {
    /// Required, defined, and not yet enabled.
    pub to_enable: BTreeSet<String>,
    /// Enabled but no longer required.
    pub to_disable: BTreeSet<String>,
    /// Required but never defined; reported as warnings, never enabled.
    pub missing: BTreeSet<String>,
}

impl ActivationDiff {
    pub fn is_empty(&self) -> bool {
        self.to_enable.is_empty() && self.to_disable.is_empty()
    }
}

/// Compute the minimal diff between the current and required activation
/// sets.
///
/// `to_disable = currently_enabled − required`;
/// `to_enable = (required ∩ all_defined) − currently_enabled`.
/// Functions in both `currently_enabled` and `required` are untouched.
pub fn diff(
    all_defined: &BTreeSet<String>,
    currently_enabled: &BTreeSet<String>,
    required: &BTreeSet<String>,
) -> ActivationDiff {
    let to_disable = currently_enabled
        .difference(required)
        .cloned()
        .collect();

    let mut to_enable = BTreeSet::new();
    let mut missing = BTreeSet::new();
    for name in required {
        if !all_defined.contains(name) {
            missing.insert(name.clone());
        } else if !currently_enabled.contains(name) {
            to_enable.insert(name.clone());
        }
    }

    ActivationDiff {
        to_enable,
        to_disable,
        missing,
    }
}
