//! Request router.
//!
//! Routes are kept per method in registration order. Lookup honors the
//! request's `Accept-Version` range and, for upload methods, the route's
//! accepted content types.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_rest::router::{Router, RouterOptions, RouteOptions};
//! use http::Method;
//!
//! let mut router = Router::new(RouterOptions::default());
//! let name = router.mount(RouteOptions::new("/users/:id").method(Method::GET))?;
//! assert_eq!(router.render(&name, &[("id", "42")], &[])?, "/users/42");
//! ```

mod path;
mod route;
pub mod version;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use http::Method;
use thiserror::Error;

use crate::core::Request;
use crate::errors::{HttpError, HttpErrorKind, RestErrorKind};

pub use path::RoutePath;
pub use route::{route_name, PathSpec, Route, RouteOptions};
use version::VersionRange;

/// Errors raised while mounting or rendering routes.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("route {0} already exists")]
    DuplicateRoute(String),

    #[error("invalid route path {path}: {source}")]
    InvalidPattern {
        path: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("route {0} does not exist")]
    UnknownRoute(String),

    #[error("route {route} is missing param {param}")]
    MissingParam { route: String, param: String },

    #[error("route {0} uses a regex path and cannot be rendered")]
    NotRenderable(String),
}

/// Router-wide defaults.
#[derive(Clone, Debug, Default)]
pub struct RouterOptions {
    pub name: String,
    /// Versions applied to routes that declare none.
    pub versions: Vec<String>,
    /// Content types applied to routes that declare none.
    pub content_type: Vec<String>,
    pub strict_routing: bool,
}

/// A successful lookup.
#[derive(Clone, Debug)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: HashMap<String, String>,
}

/// Routes by method, plus a name index.
#[derive(Clone, Debug, Default)]
pub struct Router {
    name: String,
    versions: Vec<String>,
    content_type: Vec<String>,
    strict: bool,
    routes: BTreeMap<String, Vec<Arc<Route>>>,
    mounts: HashMap<String, Arc<Route>>,
}

impl Router {
    pub fn new(options: RouterOptions) -> Self {
        Self {
            name: options.name,
            versions: options.versions,
            content_type: options.content_type,
            strict: options.strict_routing,
            routes: BTreeMap::new(),
            mounts: HashMap::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Router-wide default versions.
    #[inline]
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    #[inline]
    pub fn content_type(&self) -> &[String] {
        &self.content_type
    }

    /// All mounted routes by name.
    pub fn mounts(&self) -> &HashMap<String, Arc<Route>> {
        &self.mounts
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Route>> {
        self.mounts.get(name)
    }

    /// Routes registered for a method, in registration order.
    pub fn routes_for(&self, method: &Method) -> &[Arc<Route>] {
        self.routes
            .get(method.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Mount a route and return its name.
    pub fn mount(&mut self, mut options: RouteOptions) -> Result<String, RouterError> {
        if options.versions.is_empty() {
            options.versions = self.versions.clone();
        }
        if options.content_type.is_empty() {
            options.content_type = self.content_type.clone();
        }

        let route = Route::compile(options, self.strict)?;
        if self.mounts.contains_key(&route.name) {
            return Err(RouterError::DuplicateRoute(route.name));
        }

        let route = Arc::new(route);
        tracing::debug!(
            route = %route.name,
            method = %route.method,
            path = %route.path,
            "route mounted"
        );

        self.routes
            .entry(route.method.as_str().to_string())
            .or_default()
            .push(Arc::clone(&route));
        self.mounts.insert(route.name.clone(), Arc::clone(&route));
        Ok(route.name.clone())
    }

    /// Remove a route by name; returns the name when it existed.
    pub fn unmount(&mut self, name: &str) -> Option<String> {
        let route = self.mounts.remove(name)?;
        if let Some(list) = self.routes.get_mut(route.method.as_str()) {
            list.retain(|r| r.name != name);
            if list.is_empty() {
                self.routes.remove(route.method.as_str());
            }
        }
        Some(route.name.clone())
    }

    /// Methods that have a route matching `path`.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.routes
            .iter()
            .filter(|(_, list)| list.iter().any(|r| r.path.is_match(path)))
            .filter_map(|(m, _)| Method::from_bytes(m.as_bytes()).ok())
            .collect()
    }

    /// Find the route for a request.
    ///
    /// `HEAD` falls back to `GET` routes when no `HEAD` route matches.
    pub fn find(&self, req: &Request) -> Result<RouteMatch, HttpError> {
        let path = req.path();
        let mut candidates = self.candidates(req.method(), path);
        if candidates.is_empty() && req.method() == Method::HEAD {
            candidates = self.candidates(&Method::GET, path);
        }

        if candidates.is_empty() {
            let allowed = self.allowed_methods(path);
            if allowed.is_empty() {
                return Err(HttpError::new(
                    RestErrorKind::ResourceNotFound,
                    format!("{} does not exist", path),
                ));
            }
            let allow = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(HttpError::new(
                HttpErrorKind::MethodNotAllowed,
                format!("{} is not allowed", req.method()),
            )
            .with_header("Allow", allow));
        }

        let requested = req.api_version();
        let range = VersionRange::parse(requested).ok_or_else(|| {
            HttpError::new(
                RestErrorKind::InvalidVersion,
                format!("{} is not a valid version", requested),
            )
        })?;

        let mut versioned: Vec<(&Arc<Route>, HashMap<String, String>, Option<semver::Version>)> =
            Vec::new();
        let mut offered_versions: Vec<&str> = Vec::new();
        for (route, params) in candidates {
            if route.versions.is_empty() {
                versioned.push((route, params, None));
                continue;
            }
            offered_versions.extend(route.versions.iter().map(|v| v.as_str()));
            if let Some(v) = range.max_satisfying(&route.versions) {
                versioned.push((route, params, Some(v)));
            }
        }

        if versioned.is_empty() {
            return Err(HttpError::new(
                RestErrorKind::InvalidVersion,
                format!(
                    "{} {} supports versions: {}",
                    req.method(),
                    path,
                    offered_versions.join(", ")
                ),
            ));
        }

        let is_upload = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH);
        if is_upload {
            let before = versioned.len();
            versioned.retain(|(route, _, _)| {
                route.types.is_empty() || route.types.iter().any(|t| req.is(t))
            });
            if versioned.is_empty() && before > 0 {
                return Err(HttpError::new(
                    HttpErrorKind::UnsupportedMediaType,
                    req.content_type().to_string(),
                ));
            }
        }

        // Highest satisfying version wins; ties keep registration order.
        let mut best = 0;
        for i in 1..versioned.len() {
            if versioned[i].2 > versioned[best].2 {
                best = i;
            }
        }
        let (route, params, _) = versioned.swap_remove(best);

        Ok(RouteMatch {
            route: Arc::clone(route),
            params,
        })
    }

    fn candidates<'a>(
        &'a self,
        method: &Method,
        path: &str,
    ) -> Vec<(&'a Arc<Route>, HashMap<String, String>)> {
        self.routes_for(method)
            .iter()
            .filter_map(|r| r.path.matches(path).map(|p| (r, p)))
            .collect()
    }

    /// Build a URL for a named route; query pairs are percent-encoded.
    pub fn render(
        &self,
        name: &str,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<String, RouterError> {
        let route = self
            .mounts
            .get(name)
            .ok_or_else(|| RouterError::UnknownRoute(name.to_string()))?;

        let mut url = route.path.render(name, params)?;
        if !query.is_empty() {
            url.push('?');
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
                .collect();
            url.push_str(&encoded.join("&"));
        }
        Ok(url)
    }
}

fn encode_component(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "router" } else { self.name.as_str() };
        writeln!(f, "// {} routes", name)?;
        for (method, routes) in &self.routes {
            writeln!(f, "{}:", method)?;
            for route in routes {
                write!(f, "    {}: {}", route.name, route.path)?;
                if !route.versions.is_empty() {
                    write!(f, " (versions: {})", route.versions.join(", "))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
