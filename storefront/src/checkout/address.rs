//! Shipping address form and validation.

use crate::types::ShippingAddress;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

const MOBILE_DIGITS: usize = 10;

/// A field of the address form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressField {
    /// Recipient name.
    Name,
    /// Contact email.
    Email,
    /// Mobile number.
    Mobile,
    /// Country.
    Country,
    /// Street address.
    Address,
    /// City.
    City,
}

impl AddressField {
    /// All fields in form order.
    pub const ALL: [Self; 6] = [
        Self::Name,
        Self::Email,
        Self::Mobile,
        Self::Country,
        Self::Address,
        Self::City,
    ];

    /// Wire / form name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Country => "country",
            Self::Address => "address",
            Self::City => "city",
        }
    }

    const fn value(self, address: &ShippingAddress) -> &String {
        match self {
            Self::Name => &address.name,
            Self::Email => &address.email,
            Self::Mobile => &address.mobile,
            Self::Country => &address.country,
            Self::Address => &address.address,
            Self::City => &address.city,
        }
    }

    fn value_mut(self, address: &mut ShippingAddress) -> &mut String {
        match self {
            Self::Name => &mut address.name,
            Self::Email => &mut address.email,
            Self::Mobile => &mut address.mobile,
            Self::Country => &mut address.country,
            Self::Address => &mut address.address,
            Self::City => &mut address.city,
        }
    }

    /// Error message for `value`, if it is not acceptable.
    fn check(self, value: &str) -> Option<&'static str> {
        let trimmed = value.trim();
        let long_enough = |min: usize| !trimmed.is_empty() && value.chars().count() >= min;

        match self {
            Self::Name => (!long_enough(2)).then_some("Name must be at least 2 characters"),
            Self::Email => {
                if trimmed.is_empty() {
                    Some("Email is required")
                } else if !is_valid_email(value) {
                    Some("Please enter a valid email address")
                } else {
                    None
                }
            },
            Self::Mobile => {
                if trimmed.is_empty() {
                    Some("Mobile number is required")
                } else if value.len() != MOBILE_DIGITS
                    || !value.chars().all(|c| c.is_ascii_digit())
                {
                    Some("Mobile number must be exactly 10 digits")
                } else {
                    None
                }
            },
            Self::Country => (!long_enough(2)).then_some("Country is required"),
            Self::Address => (!long_enough(5)).then_some("Address must be at least 5 characters"),
            Self::City => (!long_enough(2)).then_some("City is required"),
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}

/// Keep digits only, at most ten of them.
fn normalize_mobile(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_digit)
        .take(MOBILE_DIGITS)
        .collect()
}

/// A shipping address that passed validation.
///
/// Only [`AddressForm::validate`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAddress(ShippingAddress);

impl ValidatedAddress {
    /// The address.
    #[must_use]
    pub const fn get(&self) -> &ShippingAddress {
        &self.0
    }

    /// Unwrap into the plain address.
    #[must_use]
    pub fn into_inner(self) -> ShippingAddress {
        self.0
    }
}

/// Draft address plus per-field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressForm {
    draft: ShippingAddress,
    errors: BTreeMap<AddressField, String>,
}

impl AddressForm {
    /// An empty form with the email and country pre-filled.
    #[must_use]
    pub fn new(email: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            draft: ShippingAddress {
                email: email.into(),
                country: country.into(),
                ..ShippingAddress::default()
            },
            errors: BTreeMap::new(),
        }
    }

    /// A form filled with an existing address.
    #[must_use]
    pub fn with_draft(draft: ShippingAddress) -> Self {
        Self {
            draft,
            errors: BTreeMap::new(),
        }
    }

    /// Current draft.
    #[must_use]
    pub const fn draft(&self) -> &ShippingAddress {
        &self.draft
    }

    /// Errors from the last validation, minus fields edited since.
    #[must_use]
    pub const fn errors(&self) -> &BTreeMap<AddressField, String> {
        &self.errors
    }

    /// Error shown under a field.
    #[must_use]
    pub fn error(&self, field: AddressField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// Edit a field and clear its error. Mobile input keeps digits only.
    pub fn set(&mut self, field: AddressField, value: impl Into<String>) {
        let value = value.into();
        let value = match field {
            AddressField::Mobile => normalize_mobile(&value),
            _ => value,
        };
        *field.value_mut(&mut self.draft) = value;
        self.errors.remove(&field);
    }

    /// Validate every field.
    ///
    /// Replaces the error map; returns the validated address when it is
    /// empty.
    pub fn validate(&mut self) -> Option<ValidatedAddress> {
        self.errors = AddressField::ALL
            .into_iter()
            .filter_map(|field| {
                field
                    .check(field.value(&self.draft))
                    .map(|message| (field, message.to_string()))
            })
            .collect();

        self.errors
            .is_empty()
            .then(|| ValidatedAddress(self.draft.clone()))
    }
}
