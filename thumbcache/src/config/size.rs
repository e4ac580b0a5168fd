//! Human-readable size parsing (e.g., "2GB", "500MB").

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '512MB', '2GB', or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Parse a human-readable size string into bytes.
///
/// Accepts bare byte counts and `K`/`KB`, `M`/`MB`, `G`/`GB` suffixes
/// (binary multiples), case-insensitive, with optional inner whitespace.
///
/// # Examples
///
/// ```
/// use thumbcache::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1 KB").unwrap(), 1024);
/// assert_eq!(parse_size("512mb").unwrap(), 512 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = [("GB", GB), ("G", GB), ("MB", MB), ("M", MB), ("KB", KB), ("K", KB)]
        .iter()
        .find(|(suffix, _)| upper.ends_with(suffix))
        .map(|(suffix, multiplier)| (&trimmed[..trimmed.len() - suffix.len()], *multiplier))
        .unwrap_or((trimmed, 1));

    let digits = digits.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SizeParseError::new(s));
    }
    let value: u64 = digits.parse().map_err(|_| SizeParseError::new(s))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(s))
}

/// Format a byte count using the largest unit that divides it evenly.
///
/// ```
/// use thumbcache::config::format_size;
///
/// assert_eq!(format_size(256 * 1024 * 1024), "256MB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        bytes.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_number() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("500MB").unwrap(), 500 * 1024 * 1024);
        assert_eq!(parse_size("2g").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_whitespace() {
        assert_eq!(parse_size("  2GB  ").unwrap(), 2 * GB);
        assert_eq!(parse_size("256 MB").unwrap(), 256 * MB);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("2TB").is_err());
        assert!(parse_size("-1GB").is_err());
        assert!(parse_size("1.5GB").is_err());
        assert!(parse_size("99999999999999999999G").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1024), "1KB");
        assert_eq!(format_size(256 * MB), "256MB");
        assert_eq!(format_size(3 * GB), "3GB");
        assert_eq!(format_size(1536), "1536");
    }
}
