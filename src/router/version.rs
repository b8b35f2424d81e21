//! Semver helpers for `Accept-Version` matching.

use semver::{Version, VersionReq};

/// Pad short versions: `1` becomes `1.0.0`, `1.2` becomes `1.2.0`.
pub fn pad(version: &str) -> String {
    let v = version.trim().trim_start_matches('v');
    match v.split('.').count() {
        1 => format!("{}.0.0", v),
        2 => format!("{}.0", v),
        _ => v.to_string(),
    }
}

/// Parse a route version.
pub fn parse_version(version: &str) -> Option<Version> {
    Version::parse(&pad(version)).ok()
}

/// A requested version range.
///
/// A bare version means an exact match; anything else is a semver range.
#[derive(Clone, Debug)]
pub enum VersionRange {
    Any,
    Exact(Version),
    Req(VersionReq),
}

impl VersionRange {
    pub fn parse(range: &str) -> Option<Self> {
        let range = range.trim();
        if range.is_empty() || range == "*" || range.eq_ignore_ascii_case("x") {
            return Some(VersionRange::Any);
        }
        if let Some(v) = parse_version(range) {
            return Some(VersionRange::Exact(v));
        }
        VersionReq::parse(range).ok().map(VersionRange::Req)
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionRange::Any => true,
            VersionRange::Exact(v) => v == version,
            VersionRange::Req(req) => req.matches(version),
        }
    }

    /// Highest of `versions` that satisfies this range.
    pub fn max_satisfying<'a, I>(&self, versions: I) -> Option<Version>
    where
        I: IntoIterator<Item = &'a String>,
    {
        versions
            .into_iter()
            .filter_map(|v| parse_version(v))
            .filter(|v| self.matches(v))
            .max()
    }
}
