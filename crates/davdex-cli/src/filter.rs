//! Glob-based include/exclude filter for listings
//!
//! Built on the override matcher from the `ignore` crate: include patterns
//! whitelist paths, exclude patterns (added with a `!` prefix) drop them.
//! With no include patterns everything not excluded passes; with include
//! patterns only matches pass.

use anyhow::Result;
use ignore::overrides::{Override, OverrideBuilder};

use davdex_core::ports::Filter;

pub struct GlobFilter {
    matcher: Option<Override>,
    /// What an unmatched path gets: true unless include patterns were given
    default_include: bool,
}

impl GlobFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        if includes.is_empty() && excludes.is_empty() {
            return Ok(Self {
                matcher: None,
                default_include: true,
            });
        }

        let mut builder = OverrideBuilder::new("/");
        for pattern in includes {
            builder.add(pattern)?;
        }
        for pattern in excludes {
            builder.add(&format!("!{pattern}"))?;
        }

        Ok(Self {
            matcher: Some(builder.build()?),
            default_include: includes.is_empty(),
        })
    }
}

impl Filter for GlobFilter {
    fn include(&self, relative_path: &str) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };
        let matched = matcher.matched(relative_path, false);
        if matched.is_whitelist() {
            true
        } else if matched.is_ignore() {
            false
        } else {
            self.default_include
        }
    }
}
