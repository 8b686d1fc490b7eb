//! Glob matching for bulk invalidation.
//!
//! Supports `*` (any run of characters, including none) and `?` (exactly one
//! character). Every other character matches itself.

/// Returns true when `key` matches the glob `pattern`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` seen and the key index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
            }
            Some('?') => {
                p += 1;
                k += 1;
            }
            Some(&c) if c == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    k = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Literal prefix before the first wildcard, used to skip obvious non-matches.
pub fn literal_prefix(pattern: &str) -> &str {
    match pattern.find(['*', '?']) {
        Some(index) => &pattern[..index],
        None => pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_star_matches_prefix() {
        assert!(glob_match("post:*", "post:hello-world"));
        assert!(glob_match("post:*", "post:"));
        assert!(!glob_match("post:*", "posts:all:1:10"));
        assert!(!glob_match("post:*", "popular:5"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        assert!(glob_match("post:?", "post:1"));
        assert!(!glob_match("post:?", "post:12"));
    }

    #[test]
    fn inner_star_backtracks() {
        assert!(glob_match("posts:*:1:*", "posts:rust:1:10"));
        assert!(glob_match("*:10", "posts:all:1:10"));
        assert!(!glob_match("*:10", "posts:all:1:100"));
    }

    #[test]
    fn exact_pattern_matches_only_itself() {
        assert!(glob_match("stats", "stats"));
        assert!(!glob_match("stats", "stats:x"));
    }

    #[test]
    fn lone_star_matches_everything() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "categories"));
    }

    #[test]
    fn prefix_stops_at_first_wildcard() {
        assert_eq!(literal_prefix("post:*"), "post:");
        assert_eq!(literal_prefix("po?t:*"), "po");
        assert_eq!(literal_prefix("stats"), "stats");
    }
}
