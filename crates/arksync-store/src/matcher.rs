//! Glob filtering of repository paths.
//!
//! Patterns use gitignore syntax via `ignore::overrides`. A path matches when
//! it, or any of its parent directories, matches one of the patterns, so
//! `2022` selects everything under `2022/`.

use std::path::Path;

use ignore::overrides::{Override, OverrideBuilder};

use crate::error::{RepositoryError, Result};

/// Compiled set of include patterns.
pub struct PathMatcher {
    overrides: Option<Override>,
}

impl PathMatcher {
    /// Compile `globs`. An empty list, `*`, or `.` matches every path.
    pub fn new(globs: &[String]) -> Result<Self> {
        if globs.is_empty() || globs.iter().any(|g| g == "*" || g == ".") {
            return Ok(Self::all());
        }

        // Paths are matched relative, so the builder root is never touched.
        let mut builder = OverrideBuilder::new("/");
        for glob in globs {
            let pattern = glob.trim_start_matches("./");
            builder
                .add(pattern)
                .map_err(|e| RepositoryError::InvalidGlob(format!("{glob}: {e}")))?;
        }
        let overrides = builder
            .build()
            .map_err(|e| RepositoryError::InvalidGlob(e.to_string()))?;

        Ok(Self {
            overrides: Some(overrides),
        })
    }

    pub fn all() -> Self {
        Self { overrides: None }
    }

    /// Whether the repository path `path` is selected.
    pub fn is_match(&self, path: &str) -> bool {
        let Some(overrides) = &self.overrides else {
            return true;
        };

        let path = Path::new(path);
        path.ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|candidate| {
                let is_dir = candidate != path;
                overrides.matched(candidate, is_dir).is_whitelist()
            })
    }

    /// Keep the selected paths.
    pub fn filter<I, S>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        paths
            .into_iter()
            .map(Into::into)
            .filter(|p| self.is_match(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globs(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_star_matches_everything() {
        let matcher = PathMatcher::new(&globs(&["*"])).unwrap();
        assert!(matcher.is_match("a/b/c.txt"));
        assert!(PathMatcher::new(&globs(&["."])).unwrap().is_match("x"));
        assert!(PathMatcher::new(&[]).unwrap().is_match("x"));
    }

    #[test]
    fn test_extension_glob() {
        let matcher = PathMatcher::new(&globs(&["*.jpg"])).unwrap();
        assert!(matcher.is_match("photo.jpg"));
        assert!(matcher.is_match("2022/02/photo.jpg"));
        assert!(!matcher.is_match("notes.txt"));
    }

    #[test]
    fn test_directory_selects_contents() {
        let matcher = PathMatcher::new(&globs(&["2022"])).unwrap();
        assert!(matcher.is_match("2022/02/01.JPG"));
        assert!(!matcher.is_match("2023/01.JPG"));
    }

    #[test]
    fn test_anchored_pattern() {
        let matcher = PathMatcher::new(&globs(&["/docs/*.md"])).unwrap();
        assert!(matcher.is_match("docs/readme.md"));
        assert!(!matcher.is_match("other/docs/readme.md"));
    }
}
