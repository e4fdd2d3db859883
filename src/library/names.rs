const DEFAULT_FIRST_NAME: &str = "User";

/// Upper-cases the first character and keeps the rest as written.
fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Derives a `(first, last)` name pair from an email address.
///
/// The local part is split on `.` when it has one, otherwise on `_`, and the
/// first two segments are capitalized. Without a usable local part the pair
/// is `("User", "")`.
pub fn derive_name_from_email(email: Option<&str>) -> (String, String) {
    let local = email
        .and_then(|e| e.split('@').next())
        .map(str::trim)
        .unwrap_or("");

    let separator = if local.contains('.') {
        '.'
    } else if local.contains('_') {
        '_'
    } else {
        let first = capitalize(local);
        return if first.is_empty() {
            (DEFAULT_FIRST_NAME.to_string(), String::new())
        } else {
            (first, String::new())
        };
    };

    let mut segments = local.split(separator);
    let first = segments.next().map(capitalize).unwrap_or_default();
    let last = segments.next().map(capitalize).unwrap_or_default();
    if first.is_empty() {
        (DEFAULT_FIRST_NAME.to_string(), last)
    } else {
        (first, last)
    }
}
