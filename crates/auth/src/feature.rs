use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Capability identifier grantable to a group.
///
/// Features are opaque strings (e.g. "command.manage"). Built-in keys live in
/// [`features`]; tenants may define more at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feature(Cow<'static, str>);

impl Feature {
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }

    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Feature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Feature {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

/// Feature keys required by the built-in use cases.
pub mod features {
    use super::Feature;

    pub const COMMAND_MANAGE: Feature = Feature::from_static("command.manage");
    pub const COMMAND_CANCEL: Feature = Feature::from_static("command.cancel");
    pub const COMMAND_DISCOUNT: Feature = Feature::from_static("command.discount");
    pub const ORDER_MANAGE: Feature = Feature::from_static("order.manage");
    pub const ORDER_CANCEL: Feature = Feature::from_static("order.cancel");
    pub const TABLE_MANAGE: Feature = Feature::from_static("table.manage");
    pub const CASH_REGISTER_OPEN: Feature = Feature::from_static("cash_register.open");
    pub const CASH_REGISTER_CLOSE: Feature = Feature::from_static("cash_register.close");
    pub const CASH_REGISTER_REVIEW: Feature = Feature::from_static("cash_register.review");
    pub const COMPANY_ADMIN: Feature = Feature::from_static("company.admin");
}
