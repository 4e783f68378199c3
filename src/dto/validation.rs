//! Validation helpers for DTOs.

use validator::ValidationError;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

const MEDIA_TAGS: [&str; 6] = ["<img", "<video", "<audio", "<iframe", "<object", "<embed"];

const FILE_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "webp", "svg", "ico", "tif", "tiff", "heic",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "rtf", "csv",
    // archives
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2",
    // executables and media
    "exe", "msi", "dmg", "apk", "bat", "sh", "jar", "mp3", "mp4", "mov", "avi", "wav",
];

fn error(code: &'static str, message: impl Into<String>) -> ValidationError {
    let message: String = message.into();
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "Value must not be blank"));
    }
    Ok(())
}

/// Requires at least [`MIN_PASSWORD_LENGTH`] characters.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(error(
            "password_length",
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters (got {length})"),
        ));
    }
    Ok(())
}

/// Validates a chat line and returns its trimmed text.
///
/// Chat is text only: embedded data URIs, `file://` URLs, HTML media tags and
/// links pointing at files are refused.
///
/// # Examples
///
/// ```ignore
/// check_message_text("  gg everyone ", 1000)           // Ok("gg everyone")
/// check_message_text("<img src=x>", 1000)              // Err - media tag
/// check_message_text("https://x.io/map.pdf", 1000)     // Err - file link
/// ```
pub fn check_message_text(text: &str, max_length: usize) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(error("message_empty", "Message must not be empty"));
    }
    let length = trimmed.chars().count();
    if length > max_length {
        return Err(error(
            "message_length",
            format!("Message must be at most {max_length} characters (got {length})"),
        ));
    }

    let lowered = trimmed.to_lowercase();
    if contains_data_uri(&lowered) {
        return Err(error("message_data_uri", "Data URIs are not allowed in chat"));
    }
    if lowered.contains("file://") {
        return Err(error("message_file_url", "File URLs are not allowed in chat"));
    }
    if MEDIA_TAGS.iter().any(|tag| lowered.contains(tag)) {
        return Err(error("message_media_tag", "HTML media is not allowed in chat"));
    }
    if lowered.split_whitespace().any(is_file_link) {
        return Err(error(
            "message_file_link",
            "Links to files are not allowed in chat; only text is supported",
        ));
    }

    Ok(trimmed.to_string())
}

/// Matches `data:<type>/<subtype>` anywhere in the (lowercased) text.
fn contains_data_uri(lowered: &str) -> bool {
    lowered.match_indices("data:").any(|(index, _)| {
        let rest = &lowered[index + "data:".len()..];
        let media_type: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.'))
            .collect();
        !media_type.is_empty() && rest[media_type.len()..].starts_with('/')
    })
}

/// Whether a whitespace-separated token is a URL whose path ends in a file extension.
fn is_file_link(token: &str) -> bool {
    let token = token.trim_matches(|c: char| matches!(c, '(' | ')' | '<' | '>' | '"' | '\''));
    let Some(rest) = ["http://", "https://", "ftp://", "www."]
        .iter()
        .find_map(|scheme| token.strip_prefix(scheme))
    else {
        return false;
    };
    let path = rest
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(['.', ',', '!', ';', ':']);
    let Some((host, path)) = path.split_once('/') else {
        return false;
    };
    if host.is_empty() {
        return false;
    }
    path.rsplit_once('.')
        .is_some_and(|(_, extension)| FILE_EXTENSIONS.contains(&extension))
}
