use validator::ValidateEmail;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Validates a guest display name: non-empty after trimming, bounded length.
pub fn is_valid_guest_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name.len() <= 120
}
