//! Route path compilation and matching.
//!
//! A pattern like `/users/:id/files/:name([a-z]+)` compiles to an anchored
//! regex; each `:param` fragment becomes one capture group.

use std::collections::HashMap;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;

use super::RouterError;

/// Default capture for a `:param` fragment.
const DEFAULT_PARAM_PATTERN: &str = "[^/]*";

/// A compiled route path.
#[derive(Clone)]
pub struct RoutePath {
    source: String,
    regex: Regex,
    params: Vec<String>,
    from_regex: bool,
}

impl RoutePath {
    /// Compile a `:param` style pattern.
    ///
    /// Literal fragments are escaped; unless `strict`, trailing slashes are optional.
    pub fn compile(
        pattern: &str,
        url_param_pattern: Option<&str>,
        strict: bool,
    ) -> Result<Self, RouterError> {
        let mut re = String::from("^");
        let mut params = Vec::new();

        for frag in pattern.split('/').filter(|f| !f.is_empty()) {
            re.push_str("\\/+");
            match frag.strip_prefix(':') {
                Some(label) => {
                    let (name, sub) = match label.find('(') {
                        Some(idx) if label.ends_with(')') => {
                            (&label[..idx], &label[idx + 1..label.len() - 1])
                        }
                        _ => (label, url_param_pattern.unwrap_or(DEFAULT_PARAM_PATTERN)),
                    };
                    re.push('(');
                    re.push_str(sub);
                    re.push(')');
                    params.push(name.to_string());
                }
                None => re.push_str(&regex::escape(frag)),
            }
        }

        if re == "^" {
            re.push_str("\\/");
        } else if strict {
            if pattern.ends_with('/') {
                re.push_str("\\/");
            }
        } else {
            re.push_str("[\\/]*");
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|source| RouterError::InvalidPattern {
            path: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            params,
            from_regex: false,
        })
    }

    /// Use a caller-supplied regex; captures are exposed as `"0"`, `"1"`, ...
    pub fn from_regex(regex: Regex) -> Self {
        let count = regex.captures_len().saturating_sub(1);
        Self {
            source: regex.as_str().to_string(),
            params: (0..count).map(|i| i.to_string()).collect(),
            regex,
            from_regex: true,
        }
    }

    /// The pattern as registered.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Names of the captured params, in capture order.
    #[inline]
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    #[inline]
    pub fn is_regex(&self) -> bool {
        self.from_regex
    }

    #[inline]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a request path, returning decoded params.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let mut params = HashMap::with_capacity(self.params.len());
        for (i, name) in self.params.iter().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                let value = percent_decode_str(m.as_str()).decode_utf8_lossy().into_owned();
                params.insert(name.clone(), value);
            }
        }
        Some(params)
    }

    /// Build a concrete path from params.
    pub(crate) fn render(
        &self,
        route: &str,
        params: &[(&str, &str)],
    ) -> Result<String, RouterError> {
        if self.from_regex {
            return Err(RouterError::NotRenderable(route.to_string()));
        }

        let mut out = String::new();
        for frag in self.source.split('/').filter(|f| !f.is_empty()) {
            out.push('/');
            match frag.strip_prefix(':') {
                Some(label) => {
                    let name = label.split('(').next().unwrap_or(label);
                    let value = params
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| RouterError::MissingParam {
                            route: route.to_string(),
                            param: name.to_string(),
                        })?;
                    out.extend(utf8_percent_encode(value, NON_ALPHANUMERIC));
                }
                None => out.push_str(frag),
            }
        }

        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

impl fmt::Debug for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePath")
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .field("params", &self.params)
            .finish()
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_params() {
        let path = RoutePath::compile("/users/:id/files/:name", None, false).unwrap();
        assert_eq!(path.regex().as_str(), "^\\/+users\\/+([^/]*)\\/+files\\/+([^/]*)[\\/]*$");
        assert_eq!(path.param_names(), &["id".to_string(), "name".to_string()]);

        let params = path.matches("/users/42/files/report.txt").unwrap();
        assert_eq!(params["id"], "42");
        assert_eq!(params["name"], "report.txt");
    }

    #[test]
    fn test_root_pattern() {
        let path = RoutePath::compile("/", None, false).unwrap();
        assert_eq!(path.regex().as_str(), "^\\/$");
        assert!(path.is_match("/"));
        assert!(!path.is_match("/x"));
    }

    #[test]
    fn test_trailing_slash_optional_unless_strict() {
        let loose = RoutePath::compile("/users", None, false).unwrap();
        assert!(loose.is_match("/users"));
        assert!(loose.is_match("/users/"));
        assert!(loose.is_match("//users"));

        let strict = RoutePath::compile("/users", None, true).unwrap();
        assert!(strict.is_match("/users"));
        assert!(!strict.is_match("/users/"));
    }

    #[test]
    fn test_inline_param_regex() {
        let path = RoutePath::compile("/files/:id([0-9]+)", None, false).unwrap();
        assert!(path.is_match("/files/12"));
        assert!(!path.is_match("/files/abc"));
        assert_eq!(path.param_names(), &["id".to_string()]);
    }

    #[test]
    fn test_url_param_pattern() {
        let path = RoutePath::compile("/tags/:tag", Some("[a-z]+"), false).unwrap();
        assert!(path.is_match("/tags/rust"));
        assert!(!path.is_match("/tags/Rust1"));
    }

    #[test]
    fn test_literals_are_escaped() {
        let path = RoutePath::compile("/v1.0/ping", None, false).unwrap();
        assert!(path.is_match("/v1.0/ping"));
        assert!(!path.is_match("/v1x0/ping"));
    }

    #[test]
    fn test_params_are_decoded() {
        let path = RoutePath::compile("/search/:q", None, false).unwrap();
        let params = path.matches("/search/hello%20world").unwrap();
        assert_eq!(params["q"], "hello world");
    }

    #[test]
    fn test_regex_route_positional_params() {
        let path = RoutePath::from_regex(Regex::new(r"^/archive/(\d{4})/(\d{2})$").unwrap());
        let params = path.matches("/archive/2024/05").unwrap();
        assert_eq!(params["0"], "2024");
        assert_eq!(params["1"], "05");
        assert!(path.is_regex());
    }

    #[test]
    fn test_render() {
        let path = RoutePath::compile("/users/:id/files/:name([a-z. ]+)", None, false).unwrap();
        let url = path.render("r", &[("id", "42"), ("name", "a b")]).unwrap();
        assert_eq!(url, "/users/42/files/a%20b");

        let err = path.render("r", &[("id", "42")]).unwrap_err();
        assert!(matches!(err, RouterError::MissingParam { .. }));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RoutePath::compile("/x/:id([0-9)", None, false);
        assert!(err.is_err());
    }
}
