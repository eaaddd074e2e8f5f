use crate::location::LocationQuery;

pub const SYSTEM_MESSAGE: &str = "You are an expert assistant in public health advisories.";

/// Number of days an advisory may be old to still be reported
pub const RECENCY_DAYS: u32 = 30;

/// Maximum number of advisories the model is asked for
pub const MAX_ADVISORIES: u32 = 5;

/// Chat prompt asking the upstream model for recent advisories at one location
#[derive(Debug, Clone)]
pub struct AdvisoryPrompt {
    pub location: LocationQuery,
    pub system: &'static str,
    pub user: String,
}

impl AdvisoryPrompt {
    pub fn for_location(location: &LocationQuery) -> Self {
        Self {
            location: location.clone(),
            system: SYSTEM_MESSAGE,
            user: user_message(location),
        }
    }
}

/// Text returned to the client when the model found nothing
pub fn no_advisories_message(location: &LocationQuery) -> String {
    format!(
        "No relevant official medical advisories were found for {location} in the last {RECENCY_DAYS} days."
    )
}

fn user_message(location: &LocationQuery) -> String {
    let none_found = no_advisories_message(location);
    format!(
        "You are a specialized AI assistant tasked with finding official public health advisories.
Your goal is to return the top {MAX_ADVISORIES} most relevant and current official medical advisories issued by government or public health authorities in the last {RECENCY_DAYS} days for the location: {location}.

These advisories should be related to public health, disease outbreaks, or specific health warnings for that region.

Please ensure the advisories meet these criteria:
1. Issued by governmental or official public health bodies (e.g., CDC, WHO, Ministry of Health, state health departments).
2. Dated or updated within the last {RECENCY_DAYS} days from today.
3. Presented as clear, summarized bullet points.
4. For each advisory, include:
   - Date of issue (or last update if applicable)
   - Issuing Agency
   - A concise summary of the key recommendation or alert.
5. Avoid duplication. Only list distinct advisories.
6. Avoid irrelevant content such as general health tips, news articles not directly issuing an advisory, blog posts, or unofficial forums. Focus strictly on official advisories.

If no official advisories matching these criteria are found for {location} within the last {RECENCY_DAYS} days, you MUST explicitly state:
\"{none_found}\"

Present the findings as a numbered list if advisories are found.
Do not include any introductory or concluding remarks beyond the requested list or the \"no advisories found\" statement.
Do not include URLs unless they are part of the official advisory title or summary."
    )
}
