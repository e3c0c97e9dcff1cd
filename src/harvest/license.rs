//! License normalization and the allowed-license gate
//!
//! Providers spell licenses in many ways (`cc-by-nc`, `CC BY-SA 4.0`,
//! `http://creativecommons.org/licenses/by/4.0/`, `Public domain`). Harvesters
//! normalize to `CC0` / `CC BY[-XX...]` tokens before gating, so a single list
//! of configured tokens works for every provider.

use serde::{Deserialize, Serialize};

/// Returns true if `license` contains any allowed token, ignoring case
///
/// # Arguments
///
/// * `license` - The license string attached to a candidate
/// * `allowed` - Configured license tokens
///
/// # Returns
///
/// * `true` - At least one token is a case-insensitive substring of `license`
/// * `false` - The license is empty or matches nothing
pub fn is_license_allowed(license: &str, allowed: &[String]) -> bool {
    let license = license.trim();
    if license.is_empty() {
        return false;
    }

    let upper = license.to_uppercase();
    allowed
        .iter()
        .filter(|token| !token.trim().is_empty())
        .any(|token| upper.contains(&token.trim().to_uppercase()))
}

/// Normalizes a provider license string to a canonical token
///
/// Unrecognized strings are returned trimmed but otherwise unchanged, and an
/// empty string becomes `Unknown`.
pub fn normalize_license(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "Unknown".to_string();
    }

    let lower = trimmed.to_lowercase();

    if lower.contains("cc0")
        || lower.contains("public domain")
        || lower.contains("publicdomain")
        || lower == "pd"
    {
        return "CC0".to_string();
    }

    // creativecommons.org/licenses/by-nc-sa/4.0/
    if let Some(idx) = lower.find("creativecommons.org/licenses/") {
        let rest = &lower[idx + "creativecommons.org/licenses/".len()..];
        let code = rest.split('/').next().unwrap_or_default();
        if let Some(token) = cc_token(code) {
            return token;
        }
    }

    let code = lower.replace(['_', ' '], "-");
    if let Some(code) = code.strip_prefix("cc-") {
        if let Some(token) = cc_token(code) {
            return token;
        }
    }

    trimmed.to_string()
}

/// Builds `CC BY-XX` from a dash-separated code like `by-nc-sa-4.0`
fn cc_token(code: &str) -> Option<String> {
    let elements: Vec<&str> = code
        .split('-')
        .filter(|part| !part.is_empty())
        .take_while(|part| matches!(*part, "by" | "sa" | "nc" | "nd"))
        .collect();

    if elements.first() != Some(&"by") {
        return None;
    }

    Some(format!("CC {}", elements.join("-").to_uppercase()))
}

/// Canonical deed URL for a normalized license token
pub fn license_url(license: &str) -> String {
    let url = match license {
        "CC0" => "https://creativecommons.org/publicdomain/zero/1.0/",
        "CC BY" => "https://creativecommons.org/licenses/by/4.0/",
        "CC BY-SA" => "https://creativecommons.org/licenses/by-sa/4.0/",
        "CC BY-NC" => "https://creativecommons.org/licenses/by-nc/4.0/",
        "CC BY-NC-SA" => "https://creativecommons.org/licenses/by-nc-sa/4.0/",
        "CC BY-ND" => "https://creativecommons.org/licenses/by-nd/4.0/",
        "CC BY-NC-ND" => "https://creativecommons.org/licenses/by-nc-nd/4.0/",
        _ => "",
    };
    url.to_string()
}

/// License buckets counted by the QA report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseClass {
    Cc0,
    CcBySa,
    CcBy,
    Disallowed,
    Unknown,
}

impl LicenseClass {
    /// Classifies a license, checking the disallowed tokens first, then
    /// CC0, CC BY-SA and CC BY
    pub fn classify(license: &str, disallowed: &[String]) -> Self {
        let upper = license.to_uppercase();
        if is_license_allowed(license, disallowed) {
            Self::Disallowed
        } else if upper.contains("CC0") {
            Self::Cc0
        } else if upper.contains("CC BY-SA") {
            Self::CcBySa
        } else if upper.contains("CC BY") {
            Self::CcBy
        } else {
            Self::Unknown
        }
    }
}
