//! Model URL parsing.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::FetchError;

static MODEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/models/(\d+)").expect("valid model id pattern"));

static VERSION_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]modelVersionId=([^&#]*)").expect("valid version pattern"));

/// Identifies a model, and optionally one of its versions, on the hosting API.
///
/// Parsed once from the input URL and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelDescriptor {
    pub model_id: u64,
    pub requested_version_id: Option<u64>,
}

impl ModelDescriptor {
    /// Parse a model page URL such as
    /// `https://civitai.com/models/827184?modelVersionId=925000`.
    ///
    /// The scheme and host are not inspected; only the `/models/<id>` path
    /// segment and the `modelVersionId` query parameter matter.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        let invalid = || FetchError::InvalidUrl {
            url: url.to_string(),
        };

        let model_id = MODEL_ID
            .captures(url)
            .and_then(|c| c[1].parse::<u64>().ok())
            .ok_or_else(invalid)?;

        let requested_version_id = match VERSION_PARAM.captures(url) {
            Some(c) => Some(c[1].parse::<u64>().map_err(|_| invalid())?),
            None => None,
        };

        Ok(Self {
            model_id,
            requested_version_id,
        })
    }
}

impl FromStr for ModelDescriptor {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.requested_version_id {
            Some(v) => write!(f, "model {} (version {})", self.model_id, v),
            None => write!(f, "model {} (latest)", self.model_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_only() {
        let d = ModelDescriptor::parse("https://civitai.com/models/827184").unwrap();
        assert_eq!(d.model_id, 827184);
        assert_eq!(d.requested_version_id, None);
    }

    #[test]
    fn test_parse_with_version_and_slug() {
        let d = ModelDescriptor::parse(
            "https://civitai.com/models/827184/some-slug?modelVersionId=925000",
        )
        .unwrap();
        assert_eq!(d.model_id, 827184);
        assert_eq!(d.requested_version_id, Some(925000));
    }

    #[test]
    fn test_parse_version_not_first_param() {
        let d = ModelDescriptor::parse("civitai.com/models/12?type=x&modelVersionId=99").unwrap();
        assert_eq!(d.model_id, 12);
        assert_eq!(d.requested_version_id, Some(99));
    }

    #[test]
    fn test_parse_rejects_missing_model_segment() {
        for url in [
            "https://civitai.com/",
            "https://civitai.com/user/someone",
            "https://civitai.com/models/",
            "https://civitai.com/models/abc",
            "https://civitai.com/images/123",
            "",
        ] {
            let err = ModelDescriptor::parse(url).unwrap_err();
            assert!(matches!(err, FetchError::InvalidUrl { .. }), "{url}");
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_version() {
        let err = ModelDescriptor::parse("https://civitai.com/models/1?modelVersionId=latest")
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_from_str() {
        let d: ModelDescriptor = "https://host/models/5".parse().unwrap();
        assert_eq!(d.model_id, 5);
    }
}
