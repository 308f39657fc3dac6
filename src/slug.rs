//! Retrieval-path slug extraction.
//!
//! A retrieval path ends in `<identifier>.<ext>`, e.g.
//! `/i/9f86d081884c7d65.webp?w=300`. The identifier is the content hash
//! handed out by upload; the extension may supply the output format.

use crate::params::{OutputFormat, TransformParams};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?<identifier>[A-Za-z0-9]+)\.(?<extension>[A-Za-z]{3,4})$").expect("Invalid regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("no slug found in path: {0}")]
    NoSlug(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slug {
    pub identifier: String,
    pub extension: String,
}

/// Extract the trailing `<identifier>.<ext>` from a request path.
///
/// Anything from the first `?` or `#` on is ignored.
pub fn parse_slug(path: &str) -> Result<Slug, SlugError> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let caps = SLUG
        .captures(path)
        .ok_or_else(|| SlugError::NoSlug(path.to_string()))?;
    Ok(Slug {
        identifier: caps["identifier"].to_string(),
        extension: caps["extension"].to_ascii_lowercase(),
    })
}

impl Slug {
    /// Output format implied by the extension, if it names one.
    pub fn format(&self) -> Option<OutputFormat> {
        OutputFormat::from_extension(&self.extension)
    }

    /// Let the extension choose the output format when the query didn't.
    ///
    /// An otherwise empty request is left alone so it still gets web
    /// defaults.
    pub fn apply_extension(&self, params: TransformParams) -> TransformParams {
        if params.is_empty() || params.format().is_some() {
            return params;
        }
        match self.format() {
            Some(format) => params.with_format(format),
            None => params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn parses_bare_slug() {
        let slug = parse_slug(&format!("{HASH}.jpg")).unwrap();
        assert_eq!(slug.identifier, HASH);
        assert_eq!(slug.extension, "jpg");
    }

    #[test]
    fn parses_slug_at_end_of_path() {
        let slug = parse_slug(&format!("/images/v1/{HASH}.webp")).unwrap();
        assert_eq!(slug.identifier, HASH);
        assert_eq!(slug.format(), Some(OutputFormat::Webp));
    }

    #[test]
    fn ignores_query_and_fragment() {
        let slug = parse_slug(&format!("/i/{HASH}.png?w=300&h=200#top")).unwrap();
        assert_eq!(slug.extension, "png");
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(parse_slug("abc.JPEG").unwrap().extension, "jpeg");
    }

    #[test]
    fn rejects_paths_without_slug() {
        for path in ["", "/", "/images/abc", "/images/abc.", "/abc.j", "/abc.jpegxl", "/a-b.c"] {
            assert_eq!(
                parse_slug(path),
                Err(SlugError::NoSlug(path.to_string())),
                "{path}"
            );
        }
    }

    #[test]
    fn extension_supplies_missing_format() {
        let slug = parse_slug("abc.png").unwrap();
        let params = TransformParams::from_query("?w=100").unwrap();
        assert_eq!(slug.apply_extension(params).format(), Some(OutputFormat::Png));
    }

    #[test]
    fn explicit_format_wins_over_extension() {
        let slug = parse_slug("abc.png").unwrap();
        let params = TransformParams::from_query("?w=100&format=avif").unwrap();
        assert_eq!(slug.apply_extension(params).format(), Some(OutputFormat::Avif));
    }

    #[test]
    fn empty_request_keeps_web_defaults() {
        let slug = parse_slug("abc.png").unwrap();
        assert!(slug.apply_extension(TransformParams::default()).is_empty());
    }

    #[test]
    fn unknown_extension_is_ignored() {
        let slug = parse_slug("abc.tiff").unwrap();
        let params = TransformParams::from_query("?w=100").unwrap();
        assert_eq!(slug.apply_extension(params).format(), None);
    }
}
