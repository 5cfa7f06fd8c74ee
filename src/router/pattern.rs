//! Segment matching for `:param` and `*` route patterns.

/// True when `path` must be matched segment by segment.
pub fn is_pattern(path: &str) -> bool {
    path.contains(':') || path.contains('*')
}

/// Probes `path` against `pattern` without allocating.
pub fn matches(pattern: &str, path: &str) -> bool {
    walk(pattern, path, |_, _| {})
}

/// Matches and collects `:name` captures, in pattern order.
///
/// Returns `None` when the path does not match.
pub fn extract(pattern: &str, path: &str) -> Option<Vec<(String, String)>> {
    let mut params = Vec::new();
    let matched = walk(pattern, path, |name, value| {
        params.push((name.to_owned(), value.to_owned()))
    });
    matched.then_some(params)
}

fn walk<'a, F>(pattern: &'a str, path: &'a str, mut capture: F) -> bool
where
    F: FnMut(&'a str, &'a str),
{
    let mut expected = pattern.split('/');
    let mut actual = path.split('/');
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            // A wildcard needs at least one remaining segment, which may be empty.
            (Some("*"), Some(_)) => return true,
            (Some(segment), Some(value)) if segment.starts_with(':') => {
                let name = &segment[1..];
                if name.is_empty() || value.is_empty() {
                    return false;
                }
                capture(name, value);
            }
            (Some(segment), Some(value)) => {
                if segment != value {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/users/:id", "/users/42", true)]
    #[case("/users/:id", "/users/42/extra", false)]
    #[case("/users/:id", "/users/", false)]
    #[case("/users/:id", "/users", false)]
    #[case("/users/:id/posts/:post", "/users/7/posts/99", true)]
    #[case("/static/*", "/static/a/b/c.png", true)]
    #[case("/static/*", "/static/", true)]
    #[case("/static/*", "/static", false)]
    #[case("/static/*", "/public/a", false)]
    #[case("/*", "/anything/at/all", true)]
    #[case("/files/*/raw", "/files/x/y", true)]
    #[case("/a/:", "/a/b", false)]
    #[case("/v1/items", "/v1/items", true)]
    #[case("/v1/items", "/v1/items/", false)]
    fn matching(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(matches(pattern, path), expected, "{pattern} vs {path}");
    }

    #[test]
    fn extracts_named_segments() {
        let params = extract("/users/:id/posts/:post", "/users/7/posts/abc").unwrap();
        assert_eq!(
            params,
            vec![
                ("id".to_string(), "7".to_string()),
                ("post".to_string(), "abc".to_string())
            ]
        );
        assert!(extract("/users/:id", "/users/7/posts").is_none());
        assert!(extract("/static/*", "/static/a/b").unwrap().is_empty());
    }

    #[test]
    fn pattern_flag() {
        assert!(is_pattern("/users/:id"));
        assert!(is_pattern("/static/*"));
        assert!(is_pattern("/files/*.txt"));
        assert!(!is_pattern("/health"));
    }
}
