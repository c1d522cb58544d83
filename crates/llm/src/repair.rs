//! Best-effort cleanup of model output before JSON parsing.

/// Narrow `raw` to the span between its first `[` and last `]`, inclusive.
///
/// Models often wrap the requested array in prose or code fences.  The text
/// is trimmed first; when both brackets exist and are ordered, the outermost
/// span is returned, otherwise the trimmed text comes back unchanged and the
/// caller's parse reports the failure.
///
/// Edge cases, all left to the JSON parser:
/// - nested arrays keep their outermost span (`[[1],[2]]` stays whole);
/// - brackets inside string values are not special-cased, so a trailing
///   `"]"` in commentary can widen the span past the real array;
/// - several top-level arrays yield one invalid span covering all of them.
///
/// ```rust
/// use alterego_llm::repair_json_array;
///
/// let raw = "Sure! [{\"name\":\"温和\",\"weight\":0.7}] hope that helps";
/// assert_eq!(repair_json_array(raw), "[{\"name\":\"温和\",\"weight\":0.7}]");
/// ```
pub fn repair_json_array(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start <= end => &trimmed[start..=end],
        _ => trimmed,
    }
}
