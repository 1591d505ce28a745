//! Validation of user-supplied protocol values.
//!
//! Names (lobby names and member display names) must match
//! `^\w+[\w ]*$` (word characters plus interior/trailing spaces, never
//! a leading space) and be at most [`MAX_NAME_LEN`] characters.
//! Chat messages and lobby capacity have simple length/range bounds.
//!
//! Violations produce [`ProtoError::Validation`] whose display string
//! is the user-facing explanation.

use crate::{ProtoError, Result};

/// Maximum length of a lobby name or member display name.
pub const MAX_NAME_LEN: usize = 50;

/// Maximum length of a chat message.
pub const MAX_CHAT_MESSAGE_LEN: usize = 250;

/// Inclusive capacity bounds for a lobby.
pub const MIN_LOBBY_CAPACITY: u32 = 1;
pub const MAX_LOBBY_CAPACITY: u32 = 64;

/// Length of a lobby ID.
pub const LOBBY_ID_LEN: usize = 5;

/// Characters a lobby ID is drawn from.
pub const LOBBY_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Validate a lobby name or member display name.
///
/// # Errors
///
/// Returns [`ProtoError::Validation`] if the name is empty, longer
/// than [`MAX_NAME_LEN`], starts with a space, or contains a
/// character outside `[A-Za-z0-9_ ]`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ProtoError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ProtoError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    let mut chars = name.chars();
    // First character must be a word character, never a space.
    match chars.next() {
        Some(c) if is_word_char(c) => {}
        _ => {
            return Err(ProtoError::Validation(
                "name must start with a letter, digit, or underscore".to_string(),
            ))
        }
    }
    if !chars.all(|c| is_word_char(c) || c == ' ') {
        return Err(ProtoError::Validation(
            "name may contain only letters, digits, underscores, and spaces".to_string(),
        ));
    }
    Ok(())
}

/// Validate a lobby capacity.
///
/// # Errors
///
/// Returns [`ProtoError::Validation`] unless `1 <= capacity <= 64`.
pub fn validate_capacity(capacity: u32) -> Result<()> {
    if !(MIN_LOBBY_CAPACITY..=MAX_LOBBY_CAPACITY).contains(&capacity) {
        return Err(ProtoError::Validation(format!(
            "capacity must be between {MIN_LOBBY_CAPACITY} and {MAX_LOBBY_CAPACITY}"
        )));
    }
    Ok(())
}

/// Validate a chat message body.
///
/// # Errors
///
/// Returns [`ProtoError::Validation`] unless the length is
/// `1..=250` characters.
pub fn validate_chat_message(message: &str) -> Result<()> {
    let len = message.chars().count();
    if len == 0 || len > MAX_CHAT_MESSAGE_LEN {
        return Err(ProtoError::Validation(format!(
            "message must be between 1 and {MAX_CHAT_MESSAGE_LEN} characters"
        )));
    }
    Ok(())
}

/// Whether a string is a well-formed lobby ID (exactly 5 characters
/// from `[A-Z0-9]`).
pub fn is_lobby_id(id: &str) -> bool {
    id.len() == LOBBY_ID_LEN && id.bytes().all(|b| LOBBY_ID_CHARSET.contains(&b))
}
