use url::Url;

use crate::CoreError;

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 21;

/// Turns user input such as `sidehustle`, `r/SideHustle`, `/r/sidehustle/` or
/// `https://www.reddit.com/r/sidehustle/new` into the bare lowercase name.
pub fn normalize_subreddit_name(input: &str) -> Result<String, CoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("Subreddit name is required"));
    }

    let path = match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let host = url.host_str().unwrap_or_default();
            if host != "reddit.com" && !host.ends_with(".reddit.com") {
                return Err(invalid("Only reddit.com links are supported"));
            }
            url.path().to_string()
        }
        _ => trimmed.to_string(),
    };

    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    let name = match segments.next() {
        Some(prefix) if prefix.eq_ignore_ascii_case("r") => segments.next(),
        other => other,
    }
    .ok_or_else(|| invalid("Subreddit name is required"))?;

    let name = name.to_ascii_lowercase();
    validate(&name)?;
    Ok(name)
}

fn validate(name: &str) -> Result<(), CoreError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid_chars || !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.len()) {
        return Err(invalid(&format!("'{}' is not a valid subreddit name", name)));
    }
    Ok(())
}

fn invalid(message: &str) -> CoreError {
    CoreError::InvalidInput {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_prefix() {
        assert_eq!(normalize_subreddit_name("r/sidehustle").unwrap(), "sidehustle");
        assert_eq!(normalize_subreddit_name("/r/sidehustle/").unwrap(), "sidehustle");
        assert_eq!(normalize_subreddit_name("  sidehustle ").unwrap(), "sidehustle");
        assert_eq!(normalize_subreddit_name("R/Passive_Income").unwrap(), "passive_income");
    }

    #[test]
    fn test_accepts_reddit_urls() {
        assert_eq!(
            normalize_subreddit_name("https://www.reddit.com/r/Entrepreneur/new/").unwrap(),
            "entrepreneur"
        );
        assert_eq!(
            normalize_subreddit_name("https://old.reddit.com/r/sidehustle").unwrap(),
            "sidehustle"
        );
        assert!(normalize_subreddit_name("https://example.com/r/sidehustle").is_err());
    }

    #[test]
    fn test_rejects_invalid_names() {
        assert!(normalize_subreddit_name("").is_err());
        assert!(normalize_subreddit_name("r/").is_err());
        assert!(normalize_subreddit_name("a").is_err());
        assert!(normalize_subreddit_name("side hustle").is_err());
        assert!(normalize_subreddit_name("this_name_is_far_too_long_for_reddit").is_err());
    }
}
