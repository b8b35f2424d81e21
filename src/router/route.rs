//! Route definitions.

use std::fmt;

use http::Method;
use regex::Regex;

use super::path::RoutePath;
use super::RouterError;

/// Path of a route: a `:param` pattern or a raw regex.
#[derive(Clone, Debug)]
pub enum PathSpec {
    Pattern(String),
    Regex(Regex),
}

impl Default for PathSpec {
    fn default() -> Self {
        PathSpec::Pattern("/".to_string())
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSpec::Pattern(p) => f.write_str(p),
            PathSpec::Regex(r) => f.write_str(r.as_str()),
        }
    }
}

/// Options for registering a route.
///
/// Built from a plain path (`"/users/:id".into()`) or with the builder methods.
#[derive(Clone, Debug, Default)]
pub struct RouteOptions {
    pub name: Option<String>,
    pub method: Method,
    pub path: PathSpec,
    pub url_param_pattern: Option<String>,
    /// Accepted request content types; empty accepts any.
    pub content_type: Vec<String>,
    /// Versions this route serves; empty serves any.
    pub versions: Vec<String>,
    pub strict: bool,
}

impl RouteOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: PathSpec::Pattern(path.into()),
            ..Default::default()
        }
    }

    pub fn regex(regex: Regex) -> Self {
        Self {
            path: PathSpec::Regex(regex),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.versions.push(version.into());
        self
    }

    pub fn versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions.extend(versions.into_iter().map(Into::into));
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type.push(content_type.into());
        self
    }

    pub fn url_param_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_param_pattern = Some(pattern.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl From<&str> for RouteOptions {
    fn from(path: &str) -> Self {
        RouteOptions::new(path)
    }
}

impl From<String> for RouteOptions {
    fn from(path: String) -> Self {
        RouteOptions::new(path)
    }
}

impl From<Regex> for RouteOptions {
    fn from(regex: Regex) -> Self {
        RouteOptions::regex(regex)
    }
}

/// A mounted route.
#[derive(Clone, Debug)]
pub struct Route {
    pub name: String,
    pub method: Method,
    pub path: RoutePath,
    /// Options the route was registered with.
    pub spec: RouteOptions,
    pub types: Vec<String>,
    pub versions: Vec<String>,
}

impl Route {
    /// Compile options into a route. `strict` is the router default when the
    /// options leave it unset.
    pub fn compile(options: RouteOptions, strict: bool) -> Result<Self, RouterError> {
        for v in &options.versions {
            if super::version::parse_version(v).is_none() {
                return Err(RouterError::InvalidVersion(v.clone()));
            }
        }

        let path = match &options.path {
            PathSpec::Pattern(p) => RoutePath::compile(
                p,
                options.url_param_pattern.as_deref(),
                options.strict || strict,
            )?,
            PathSpec::Regex(r) => RoutePath::from_regex(r.clone()),
        };

        let name = options
            .name
            .clone()
            .unwrap_or_else(|| route_name(&options.method, &options.path, &options.versions));

        Ok(Self {
            name,
            method: options.method.clone(),
            path,
            types: options.content_type.clone(),
            versions: options.versions.clone(),
            spec: options,
        })
    }
}

/// Default route name: method, path and versions with non-word characters removed.
pub fn route_name(method: &Method, path: &PathSpec, versions: &[String]) -> String {
    let mut name = method.as_str().to_ascii_lowercase();
    let strip = |s: &str, out: &mut String| {
        out.extend(s.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_'));
    };
    strip(&path.to_string(), &mut name);
    for v in versions {
        strip(v, &mut name);
    }
    name
}
