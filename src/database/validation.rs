use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use crate::error::ServiceError;

/// Returns every value that occurs more than once, in first-seen order.
pub fn find_duplicates<T>(values: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = vec![];

    for value in values {
        if !seen.insert(value) && reported.insert(value) {
            duplicates.push(value.clone());
        }
    }

    duplicates
}

pub fn join_values<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

pub fn require_text(field: &str, value: &str, max_length: usize) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(field, "This field may not be blank"));
    }
    if value.chars().count() > max_length {
        return Err(ServiceError::validation(
            field,
            format!("Ensure this field has no more than {max_length} characters"),
        ));
    }
    Ok(())
}

pub fn validate_username(
    username: &str,
    reserved: &str,
    max_length: usize,
) -> Result<(), ServiceError> {
    require_text("username", username, max_length)?;

    if username == reserved {
        return Err(ServiceError::validation(
            "username",
            format!("Username \"{reserved}\" is not allowed"),
        ));
    }

    let mut banned: Vec<char> = username
        .chars()
        .filter(|c| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')))
        .collect();
    if !banned.is_empty() {
        banned.sort_unstable();
        banned.dedup();
        return Err(ServiceError::validation(
            "username",
            format!(
                "Username \"{username}\" contains forbidden characters: {}",
                banned.into_iter().collect::<String>()
            ),
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str, max_length: usize) -> Result<(), ServiceError> {
    require_text("email", email, max_length)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ServiceError::validation(
            "email",
            "Enter a valid email address",
        ));
    }
    Ok(())
}

/// `#rgb` or `#rrggbb`, case-insensitive.
pub fn validate_color(color: &str) -> Result<(), ServiceError> {
    let digits = match color.strip_prefix('#') {
        Some(digits) => digits,
        None => {
            return Err(ServiceError::validation(
                "color",
                format!("Color \"{color}\" must start with \"#\""),
            ))
        }
    };

    if digits.len() != 3 && digits.len() != 6 {
        return Err(ServiceError::validation(
            "color",
            format!(
                "Color \"{color}\" must be 4 or 7 characters long, got {}",
                color.chars().count()
            ),
        ));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ServiceError::validation(
            "color",
            format!("Color \"{color}\" contains non-hex characters"),
        ));
    }
    Ok(())
}

pub fn validate_slug(slug: &str, max_length: usize) -> Result<(), ServiceError> {
    require_text("slug", slug, max_length)?;

    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ServiceError::validation(
            "slug",
            format!("Slug \"{slug}\" may contain only latin letters, digits, \"-\" and \"_\""),
        ));
    }
    Ok(())
}

/// Escapes `LIKE` wildcards so user input only ever matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
