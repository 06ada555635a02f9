//! Cache key templates.
//!
//! A cached call is stored at `<root>/<rendered key>`. The key comes from a
//! [`KeyTemplate`] rendered against the call's [`CallArgs`]:
//!
//! | Template | Rendered from |
//! |---|---|
//! | [`KeyTemplate::Fixed`] | nothing, always the same file |
//! | [`KeyTemplate::Template`] | `{}` / `{0}` positional and `{name}` keyword placeholders |
//! | [`KeyTemplate::UrlSegment`] | a digest of the first positional argument plus its last path segment |
//!
//! Placeholder syntax follows the usual format-string rules: `{}` takes the
//! next positional argument, `{N}` takes positional argument `N`, `{name}`
//! takes a keyword argument, and `{{` / `}}` are literal braces. A template
//! called with no arguments at all renders verbatim.

use super::CacheError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Component, Path};

/// Length of the hex digest prefixed to every URL key.
const URL_DIGEST_LEN: usize = 16;

/// Stringified arguments of one cached call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    positional: Vec<String>,
    named: BTreeMap<String, String>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a call whose only argument is `value`.
    pub fn one(value: impl Display) -> Self {
        Self::new().arg(value)
    }

    pub fn arg(mut self, value: impl Display) -> Self {
        self.positional.push(value.to_string());
        self
    }

    pub fn named(mut self, name: &str, value: impl Display) -> Self {
        self.named.insert(name.to_string(), value.to_string());
        self
    }

    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// How a cached call's file name is derived from its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyTemplate {
    Fixed(String),
    Template(String),
    /// Template with a single `{}` filled by [`url_key`] of the first argument.
    UrlSegment(String),
}

impl KeyTemplate {
    pub fn fixed(name: impl Into<String>) -> Self {
        Self::Fixed(name.into())
    }

    pub fn template(template: impl Into<String>) -> Self {
        Self::Template(template.into())
    }

    pub fn url_segment(template: impl Into<String>) -> Self {
        Self::UrlSegment(template.into())
    }

    /// Render the relative artifact path for a call.
    ///
    /// Rejects keys that are absolute or climb out of the cache root.
    pub fn render(&self, args: &CallArgs) -> Result<String, CacheError> {
        let key = match self {
            Self::Fixed(name) => name.clone(),
            Self::Template(template) if args.is_empty() => template.clone(),
            Self::Template(template) => interpolate(template, args)?,
            Self::UrlSegment(template) => {
                let url = args
                    .positional(0)
                    .ok_or_else(|| CacheError::MissingArgument {
                        template: template.clone(),
                        field: "0".into(),
                    })?;
                interpolate(template, &CallArgs::one(url_key(url)))?
            }
        };
        check_relative(&key)?;
        Ok(key)
    }
}

/// File-name-safe key unique to a full URL, query included.
///
/// `<digest>-<last segment>`, or the bare digest when the URL has no usable
/// segment. The digest keeps `/a/poster.jpg` and `/b/poster.jpg` apart.
pub fn url_key(url: &str) -> String {
    let digest = url_digest(url);
    match last_segment(url) {
        Some(segment) => format!("{digest}-{segment}"),
        None => digest,
    }
}

/// Human-readable name for a URL: its last path segment, or the digest.
pub fn url_name(url: &str) -> String {
    last_segment(url).map_or_else(|| url_digest(url), str::to_string)
}

fn url_digest(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    digest[..URL_DIGEST_LEN].to_string()
}

/// Last path segment of a URL, ignoring query, fragment and trailing slashes.
fn last_segment(url: &str) -> Option<&str> {
    let without_query = url.split(['?', '#']).next().unwrap_or("");
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let path = after_scheme
        .find('/')
        .map_or("", |slash| &after_scheme[slash..]);
    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    match segment {
        "" | "." | ".." => None,
        s => Some(s),
    }
}

fn interpolate(template: &str, args: &CallArgs) -> Result<String, CacheError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(CacheError::Template {
                                template: template.to_string(),
                                reason: "unclosed '{'".into(),
                            });
                        }
                    }
                }
                let value = if field.is_empty() {
                    next_auto += 1;
                    args.positional.get(next_auto - 1)
                } else if let Ok(index) = field.parse::<usize>() {
                    args.positional.get(index)
                } else {
                    args.named.get(&field)
                };
                let value = value.ok_or_else(|| CacheError::MissingArgument {
                    template: template.to_string(),
                    field: if field.is_empty() {
                        (next_auto - 1).to_string()
                    } else {
                        field.clone()
                    },
                })?;
                out.push_str(value);
            }
            '}' => {
                return Err(CacheError::Template {
                    template: template.to_string(),
                    reason: "unmatched '}'".into(),
                });
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn check_relative(key: &str) -> Result<(), CacheError> {
    let path = Path::new(key);
    let escapes = key.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ignores_arguments() {
        let key = KeyTemplate::fixed("rec/all.json");
        assert_eq!(key.render(&CallArgs::one(7)).unwrap(), "rec/all.json");
    }

    #[test]
    fn template_positional_and_named() {
        let key = KeyTemplate::template("rec/{}/{kind}-{}.json");
        let args = CallArgs::new().arg("evento").arg(42).named("kind", "html");
        assert_eq!(key.render(&args).unwrap(), "rec/evento/html-42.json");
    }

    #[test]
    fn template_explicit_index() {
        let key = KeyTemplate::template("rec/wp/{0}.json");
        let args = CallArgs::new().arg("posts").arg(100);
        assert_eq!(key.render(&args).unwrap(), "rec/wp/posts.json");
    }

    #[test]
    fn template_without_arguments_renders_verbatim() {
        let key = KeyTemplate::template("rec/{}.json");
        assert_eq!(key.render(&CallArgs::new()).unwrap(), "rec/{}.json");
    }

    #[test]
    fn template_escaped_braces() {
        let key = KeyTemplate::template("{{x}}-{}.json");
        assert_eq!(key.render(&CallArgs::one(1)).unwrap(), "{x}-1.json");
    }

    #[test]
    fn template_missing_argument_is_error() {
        let key = KeyTemplate::template("{}-{}.json");
        let err = key.render(&CallArgs::one(1)).unwrap_err();
        assert!(matches!(err, CacheError::MissingArgument { field, .. } if field == "1"));
    }

    #[test]
    fn template_missing_keyword_is_error() {
        let key = KeyTemplate::template("{id}.json");
        let err = key.render(&CallArgs::one(1)).unwrap_err();
        assert!(matches!(err, CacheError::MissingArgument { field, .. } if field == "id"));
    }

    #[test]
    fn template_unclosed_brace_is_error() {
        let key = KeyTemplate::template("{0.json");
        assert!(matches!(
            key.render(&CallArgs::one(1)),
            Err(CacheError::Template { .. })
        ));
    }

    #[test]
    fn url_segment_strips_trailing_slash() {
        let url = "https://compras.example.com/teatro/";
        let key = KeyTemplate::url_segment("rec/evento/{}.json");
        let rendered = key.render(&CallArgs::one(url)).unwrap();
        assert_eq!(rendered, format!("rec/evento/{}-teatro.json", url_digest(url)));
    }

    #[test]
    fn url_segment_keeps_segment_without_query() {
        let url = "https://cdn.example.com/media/poster.jpg?w=300#top";
        let key = KeyTemplate::url_segment("img/{}");
        let rendered = key.render(&CallArgs::one(url)).unwrap();
        assert!(rendered.starts_with("img/"));
        assert!(rendered.ends_with("-poster.jpg"));
        assert_eq!(url_name(url), "poster.jpg");
    }

    #[test]
    fn same_segment_on_different_paths_gets_distinct_keys() {
        let first = url_key("https://tickets.example.org/show/1/cartel.jpg");
        let second = url_key("https://tickets.example.org/show/2/cartel.jpg");
        assert_ne!(first, second);
        assert!(first.ends_with("-cartel.jpg"));
        assert!(second.ends_with("-cartel.jpg"));
    }

    #[test]
    fn query_only_difference_gets_distinct_keys() {
        let key = KeyTemplate::url_segment("img/{}");
        let a = key
            .render(&CallArgs::one("https://example.org/img.php?id=1"))
            .unwrap();
        let b = key
            .render(&CallArgs::one("https://example.org/img.php?id=2"))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(url_name("https://example.org/img.php?id=1"), "img.php");
    }

    #[test]
    fn url_key_is_stable() {
        let url = "https://example.org/uploads/poster.png";
        assert_eq!(url_key(url), url_key(url));
        assert_eq!(url_key(url).len(), URL_DIGEST_LEN + "-poster.png".len());
    }

    #[test]
    fn url_without_path_falls_back_to_digest() {
        let a = url_key("https://example.com/");
        let b = url_key("https://example.org");
        assert_eq!(a.len(), URL_DIGEST_LEN);
        assert_ne!(a, b);
        assert_eq!(a, url_key("https://example.com/"));
        assert_eq!(url_name("https://example.com/"), a);
    }

    #[test]
    fn url_dot_segment_falls_back_to_digest() {
        assert_eq!(url_key("https://example.com/a/..").len(), URL_DIGEST_LEN);
    }

    #[test]
    fn keys_cannot_escape_root() {
        let key = KeyTemplate::template("rec/{}.json");
        assert!(matches!(
            key.render(&CallArgs::one("../../etc/passwd")),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(
            KeyTemplate::fixed("/abs.json").render(&CallArgs::new()),
            Err(CacheError::InvalidKey(_))
        ));
    }
}
