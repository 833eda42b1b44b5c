//! Glob-style path matching shared by exemption, exclusion and route-override lists

/// Match `value` against a glob `pattern`.
///
/// `*` matches any run of characters (including `/`), `?` matches exactly one.
pub fn glob_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let (mut p_idx, mut v_idx) = (0usize, 0usize);
    let (mut star_idx, mut match_idx) = (None, 0usize);
    let pattern_bytes = pattern.as_bytes();
    let value_bytes = value.as_bytes();

    while v_idx < value_bytes.len() {
        if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
            star_idx = Some(p_idx);
            match_idx = v_idx;
            p_idx += 1;
            continue;
        }

        if p_idx < pattern_bytes.len()
            && (pattern_bytes[p_idx] == b'?' || pattern_bytes[p_idx] == value_bytes[v_idx])
        {
            p_idx += 1;
            v_idx += 1;
            continue;
        }

        if let Some(star) = star_idx {
            p_idx = star + 1;
            match_idx += 1;
            v_idx = match_idx;
            continue;
        }

        return false;
    }

    while p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
        p_idx += 1;
    }

    p_idx == pattern_bytes.len()
}

/// True if any pattern matches, exact strings included
pub fn matches_any<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| pattern.as_ref() == path || glob_match(pattern.as_ref(), path))
}

/// Exemption lists use exact paths or `prefix/*`, where the prefix itself is also exempt.
pub fn is_exempt<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    patterns.iter().any(|pattern| {
        let pattern = pattern.as_ref();
        pattern.strip_suffix("/*").map_or(pattern == path, |base| {
            path == base
                || path
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    })
}

/// Pick the longest pattern matching `path`
pub fn longest_match<'a, T>(
    entries: impl IntoIterator<Item = (&'a str, T)>,
    path: &str,
) -> Option<T> {
    entries
        .into_iter()
        .filter(|(pattern, _)| *pattern == path || glob_match(pattern, path))
        .max_by_key(|(pattern, _)| pattern.len())
        .map(|(_, value)| value)
}
