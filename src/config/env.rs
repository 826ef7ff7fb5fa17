//! `${VAR}` substitution in raw config text.

/// Replace every `${NAME}` (uppercase letters, digits, `_`) with the value of
/// the environment variable, or the empty string when it is unset. Anything
/// else, including an unterminated `${`, is left as written.
pub fn interpolate_env(raw: &str) -> String {
    interpolate_with(raw, |name| std::env::var(name).ok())
}

pub(crate) fn interpolate_with(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if is_var_name(&after[..end]) => {
                out.push_str(&lookup(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
