pub const MAX_PLAN_NAME_LEN: usize = 100;
pub const MAX_FEATURE_LEN: usize = 255;
pub const MAX_REFERENCE_LEN: usize = 100;
pub const MAX_REJECTION_REASON_LEN: usize = 500;

/// Plan names are 1-100 characters after trimming.
pub fn is_valid_plan_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name.chars().count() <= MAX_PLAN_NAME_LEN
}

/// Trims every feature line and drops the empty ones, keeping order.
pub fn normalize_features(features: &[String]) -> Vec<String> {
    features
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_valid_feature(feature: &str) -> bool {
    feature.chars().count() <= MAX_FEATURE_LEN
}

/// Payment reference numbers: non-empty after trimming, at most 100 characters,
/// no control characters.
pub fn is_valid_reference_number(reference: &str) -> bool {
    let reference = reference.trim();
    !reference.is_empty()
        && reference.chars().count() <= MAX_REFERENCE_LEN
        && !reference.chars().any(|c| c.is_control())
}

/// Rejection reasons are required and stored verbatim, so only the trimmed
/// emptiness and the length are checked.
pub fn is_valid_rejection_reason(reason: &str) -> bool {
    !reason.trim().is_empty() && reason.chars().count() <= MAX_REJECTION_REASON_LEN
}
