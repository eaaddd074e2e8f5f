//! Advisory lookup service
//!
//! Drives one request from raw location text to a classified outcome:
//! configuration check, location validation, prompt construction, the single
//! upstream call and classification of its text.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::location::{LOCATION_REQUIRED, LocationQuery};
use crate::prompt::{AdvisoryPrompt, no_advisories_message};
use crate::upstream::AdvisoryProvider;
use crate::{AdvisoryError, Result};

pub const API_KEY_MISSING: &str = "Perplexity API key not configured";

/// Successful result of an advisory lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryOutcome {
    /// Upstream text, passed through verbatim
    Found(String),
    /// Upstream returned nothing, carries the fixed "none found" message
    NoneFound(String),
}

impl AdvisoryOutcome {
    pub fn classify(location: &LocationQuery, text: String) -> Self {
        if text.trim().is_empty() {
            Self::NoneFound(no_advisories_message(location))
        } else {
            Self::Found(text)
        }
    }

    /// Text sent back to the client
    pub fn into_text(self) -> String {
        match self {
            Self::Found(text) | Self::NoneFound(text) => text,
        }
    }
}

/// Validates locations and queries the upstream provider
pub struct AdvisoryService {
    provider: Option<Arc<dyn AdvisoryProvider>>,
}

impl AdvisoryService {
    pub fn new(provider: Arc<dyn AdvisoryProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// A service without upstream credentials; every lookup fails with a
    /// configuration error and never reaches the network.
    pub fn unconfigured() -> Self {
        Self { provider: None }
    }

    fn provider(&self) -> Result<&Arc<dyn AdvisoryProvider>> {
        self.provider
            .as_ref()
            .ok_or_else(|| AdvisoryError::config(API_KEY_MISSING))
    }

    /// Fails with a configuration error when no provider is set
    pub fn ensure_configured(&self) -> Result<()> {
        self.provider().map(|_| ())
    }

    /// Look up advisories for a raw, client-supplied location
    #[instrument(skip(self))]
    pub async fn fetch(&self, location: Option<&str>) -> Result<AdvisoryOutcome> {
        let provider = self.provider()?;

        let raw = location.ok_or_else(|| AdvisoryError::validation(LOCATION_REQUIRED))?;
        let location = LocationQuery::parse(raw).inspect_err(|e| {
            warn!("Rejected location {raw:?}: {e}");
        })?;

        let prompt = AdvisoryPrompt::for_location(&location);
        let text = provider.complete(&prompt).await?;

        let outcome = AdvisoryOutcome::classify(&location, text);
        match &outcome {
            AdvisoryOutcome::Found(_) => info!("Advisories found for {location}"),
            AdvisoryOutcome::NoneFound(_) => info!("No advisories found for {location}"),
        }
        Ok(outcome)
    }
}
