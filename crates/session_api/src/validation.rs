use shared::error::SessionError;

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_NOTE_CHARS: usize = 2000;
pub const MAX_NAME_CHARS: usize = 40;

pub fn title(raw: &str) -> Result<String, SessionError> {
    bounded("title", raw, MAX_TITLE_CHARS)
}

pub fn note_content(raw: &str) -> Result<String, SessionError> {
    bounded("note content", raw, MAX_NOTE_CHARS)
}

pub fn display_name(raw: &str) -> Result<String, SessionError> {
    bounded("display name", raw, MAX_NAME_CHARS)
}

fn bounded(field: &str, raw: &str, max_chars: usize) -> Result<String, SessionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SessionError::invalid(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(SessionError::invalid(format!(
            "{field} exceeds {max_chars} characters"
        )));
    }
    Ok(trimmed.to_string())
}
