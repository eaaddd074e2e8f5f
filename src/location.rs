//! Location validation
//!
//! Turns the free-text "State, Country" string submitted by the client into a
//! validated pair. The string is split on the first comma only, so anything
//! after it (further commas included) belongs to the country part.

use std::fmt;

use crate::{AdvisoryError, Result};

pub const LOCATION_REQUIRED: &str = "Location is required";
pub const LOCATION_FORMAT: &str = "Location format should be 'State, Country'";

/// A validated "State, Country" pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationQuery {
    pub state: String,
    pub country: String,
}

impl LocationQuery {
    /// Parse and validate a raw location string
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(AdvisoryError::validation(LOCATION_REQUIRED));
        }

        let (state, country) = input
            .split_once(',')
            .ok_or_else(|| AdvisoryError::validation(LOCATION_FORMAT))?;

        let state = state.trim();
        let country = country.trim();
        if state.is_empty() || country.is_empty() {
            return Err(AdvisoryError::validation(LOCATION_FORMAT));
        }

        Ok(Self {
            state: state.to_string(),
            country: country.to_string(),
        })
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.state, self.country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("California, United States", "California", "United States")]
    #[case(" California , United States ", "California", "United States")]
    #[case("Maharashtra,India", "Maharashtra", "India")]
    #[case("Region, Sub, Country", "Region", "Sub, Country")]
    #[case("Bavaria,,Germany", "Bavaria", ",Germany")]
    fn test_accepts_state_country(
        #[case] input: &str,
        #[case] state: &str,
        #[case] country: &str,
    ) {
        let location = LocationQuery::parse(input).unwrap();
        assert_eq!(location.state, state);
        assert_eq!(location.country, country);
    }

    #[rstest]
    #[case("California")]
    #[case("InvalidNoComma")]
    #[case("Region,")]
    #[case(", Country")]
    #[case(" , ")]
    #[case(",")]
    fn test_rejects_bad_shape(#[case] input: &str) {
        let err = LocationQuery::parse(input).unwrap_err();
        assert!(matches!(err, AdvisoryError::Validation { .. }));
        assert_eq!(err.user_message(), LOCATION_FORMAT);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn test_rejects_blank(#[case] input: &str) {
        let err = LocationQuery::parse(input).unwrap_err();
        assert_eq!(err.user_message(), LOCATION_REQUIRED);
    }

    #[test]
    fn test_display_is_normalized() {
        let location = LocationQuery::parse("  Ontario ,Canada").unwrap();
        assert_eq!(location.to_string(), "Ontario, Canada");
    }
}
