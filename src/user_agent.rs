//! Shared User-Agent string for every outbound request.
//!
//! All sources identify the crawler the same way so operators of the
//! bibliographic APIs can reach the project.

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/paper-crawler";

/// Default User-Agent for all source traffic.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("paper-crawler/{version} (research-crawler; +{PROJECT_UA_URL})")
}
