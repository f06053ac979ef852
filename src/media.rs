//! Media type parsing and wildcard pattern matching.
//!
//! Serializers declare patterns of the form `type/subtype` where either
//! segment may be `*`. A target media type matches a pattern when each
//! pattern segment is either `*` or equal (case-insensitively) to the
//! corresponding target segment. Among matching patterns precedence is
//! `type/subtype` > `type/*` > `*/subtype` > `*/*`, with registration
//! order breaking ties. This rule is part of the crate's compatibility
//! surface and must not drift.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A concrete media type, e.g. `application/json`.
///
/// Parameters (`;charset=...`) are stripped on parse; comparisons are
/// case-insensitive because both segments are lower-cased up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    main: String,
    sub: String,
}

impl MediaType {
    /// The `*/*` wildcard target, used when a message carries no
    /// Content-Type.
    pub fn any() -> Self {
        Self {
            main: "*".to_owned(),
            sub: "*".to_owned(),
        }
    }

    /// The main type segment (before the slash).
    pub fn main(&self) -> &str {
        &self.main
    }

    /// The subtype segment (after the slash).
    pub fn sub(&self) -> &str {
        &self.sub
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Drop parameters such as ";charset=utf-8".
        let essence = s.split(';').next().unwrap_or("").trim();
        let (main, sub) = essence.split_once('/').ok_or_else(|| {
            Error::configuration(format!(
                "media type `{s}` is missing the '/' separator"
            ))
        })?;
        let main = main.trim();
        let sub = sub.trim();
        if main.is_empty() || sub.is_empty() {
            return Err(Error::configuration(format!(
                "media type `{s}` has an empty segment"
            )));
        }
        Ok(Self {
            main: main.to_ascii_lowercase(),
            sub: sub.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main, self.sub)
    }
}

/// One segment of a [`MediaTypePattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Any,
    Exact(String),
}

impl Segment {
    fn parse(s: &str) -> Self {
        if s == "*" {
            Segment::Any
        } else {
            Segment::Exact(s.to_ascii_lowercase())
        }
    }

    fn matches(&self, target: &str) -> bool {
        match self {
            Segment::Any => true,
            // Targets are lower-cased on parse; `*` as a target segment
            // only matches a wildcard pattern segment.
            Segment::Exact(s) => s == target,
        }
    }
}

/// A registered media type pattern such as `text/*` or `*/*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTypePattern {
    main: Segment,
    sub: Segment,
}

impl MediaTypePattern {
    /// Parses a pattern, rejecting anything without a `/` separator.
    pub fn parse(pattern: &str) -> Result<Self> {
        let (main, sub) = pattern.trim().split_once('/').ok_or_else(|| {
            Error::configuration(format!(
                "media type pattern `{pattern}` is missing the '/' separator"
            ))
        })?;
        let main = main.trim();
        let sub = sub.trim();
        if main.is_empty() || sub.is_empty() {
            return Err(Error::configuration(format!(
                "media type pattern `{pattern}` has an empty segment"
            )));
        }
        Ok(Self {
            main: Segment::parse(main),
            sub: Segment::parse(sub),
        })
    }

    /// Whether this pattern matches the target media type.
    pub fn matches(&self, target: &MediaType) -> bool {
        let main_ok = target.main() == "*" || self.main.matches(target.main());
        let sub_ok = target.sub() == "*" || self.sub.matches(target.sub());
        main_ok && sub_ok
    }

    /// Precedence tier: lower is more specific.
    ///
    /// `type/subtype` = 0, `type/*` = 1, `*/subtype` = 2, `*/*` = 3.
    pub fn precedence(&self) -> u8 {
        match (&self.main, &self.sub) {
            (Segment::Exact(_), Segment::Exact(_)) => 0,
            (Segment::Exact(_), Segment::Any) => 1,
            (Segment::Any, Segment::Exact(_)) => 2,
            (Segment::Any, Segment::Any) => 3,
        }
    }

    /// Whether the pattern's subtype names a JSON-shaped format, which
    /// decides the canonical empty-collection form.
    pub fn is_json_like(&self) -> bool {
        matches!(&self.sub, Segment::Exact(s) if s.contains("json"))
    }
}

impl fmt::Display for MediaTypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = match &self.main {
            Segment::Any => "*",
            Segment::Exact(s) => s,
        };
        let sub = match &self.sub {
            Segment::Any => "*",
            Segment::Exact(s) => s,
        };
        write!(f, "{main}/{sub}")
    }
}
