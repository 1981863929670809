use crate::error::SitefixError;

/// Normalize user input into an absolute HTTP(S) URL suitable for an audit run.
///
/// Bare hosts get `https://` prepended. Anything that still fails to parse,
/// or parses without a host, is rejected. The returned string is the trimmed
/// input (plus scheme), not the parser's re-serialization.
pub fn normalize_url(raw: &str) -> Result<String, SitefixError> {
    let trimmed = raw.trim();
    if trimmed.len() < 3 {
        return Err(SitefixError::InvalidUrl(raw.to_string()));
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = url::Url::parse(&candidate)
        .map_err(|e| SitefixError::InvalidUrl(format!("{raw}: {e}")))?;

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(candidate),
        _ => Err(SitefixError::InvalidUrl(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com");
    }

    #[test]
    fn existing_scheme_kept() {
        assert_eq!(
            normalize_url("  http://example.com/shop?x=1 ").unwrap(),
            "http://example.com/shop?x=1"
        );
        assert_eq!(
            normalize_url("https://example.com").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn too_short_rejected() {
        assert!(matches!(normalize_url(" a "), Err(SitefixError::InvalidUrl(_))));
        assert!(matches!(normalize_url(""), Err(SitefixError::InvalidUrl(_))));
    }

    #[test]
    fn unparseable_rejected() {
        assert!(normalize_url("exa mple.com").is_err());
        assert!(normalize_url("https://").is_err());
    }
}
