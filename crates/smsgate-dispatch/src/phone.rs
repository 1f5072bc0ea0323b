// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient normalisation to E.164 under the home-country policy.

use smsgate_config::model::IntakeConfig;
use smsgate_core::SmsGateError;

/// Phone policy: a home country prefix and whether other prefixes are refused.
#[derive(Debug, Clone)]
pub struct PhonePolicy {
    country_prefix: String,
    block_international: bool,
}

impl PhonePolicy {
    pub fn new(country_prefix: impl Into<String>, block_international: bool) -> Self {
        Self {
            country_prefix: country_prefix.into(),
            block_international,
        }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(config.default_country_prefix.clone(), config.block_international)
    }

    /// Normalise a raw recipient.
    ///
    /// Non-digits other than `+` are dropped. `+…` is kept, `00…` becomes
    /// `+…`, a local `0…` number gets the country prefix, a number already
    /// starting with the prefix digits gets a leading `+`, and anything else
    /// is prefixed.
    pub fn normalize(&self, raw: &str) -> Result<String, SmsGateError> {
        let digits: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        if digits.is_empty() {
            return Err(SmsGateError::Validation("Phone number required".into()));
        }

        let prefix_digits = self.country_prefix.trim_start_matches('+');
        let normalized = if digits.starts_with('+') {
            digits
        } else if let Some(rest) = digits.strip_prefix("00") {
            format!("+{rest}")
        } else if let Some(rest) = digits.strip_prefix('0') {
            format!("{}{rest}", self.country_prefix)
        } else if !prefix_digits.is_empty() && digits.starts_with(prefix_digits) {
            format!("+{digits}")
        } else {
            format!("{}{digits}", self.country_prefix)
        };

        if self.block_international && !normalized.starts_with(&self.country_prefix) {
            return Err(SmsGateError::Validation(
                "International numbers are blocked".into(),
            ));
        }
        Ok(normalized)
    }
}
