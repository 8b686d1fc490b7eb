//! Cache key definitions.
//!
//! Keys are flat strings of the form `namespace:arg1:arg2`, so that a whole
//! namespace can be dropped with a `namespace:*` pattern. Arguments are joined
//! by their `Display` form; callers must pass consistently typed arguments for
//! the same logical query (`1` and `"1"` produce the same key). A `:` or `%`
//! inside an argument is percent-escaped, so argument boundaries in a key are
//! unambiguous.

use std::fmt::{self, Display, Write as _};

/// Separator between the namespace and each argument.
pub const KEY_DELIMITER: char = ':';

/// Logical cache namespaces, one per cached resource family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Paginated post listings, optionally filtered by category.
    Posts,
    /// Single post detail by slug.
    Post,
    /// Popular posts ranked by view count.
    Popular,
    /// Category list.
    Categories,
    /// Search result pages.
    Search,
    /// Aggregate blog statistics.
    Stats,
    /// Related posts for a post detail page.
    Related,
}

impl Namespace {
    pub const ALL: [Namespace; 7] = [
        Namespace::Posts,
        Namespace::Post,
        Namespace::Popular,
        Namespace::Categories,
        Namespace::Search,
        Namespace::Stats,
        Namespace::Related,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Posts => "posts",
            Namespace::Post => "post",
            Namespace::Popular => "popular",
            Namespace::Categories => "categories",
            Namespace::Search => "search",
            Namespace::Stats => "stats",
            Namespace::Related => "related",
        }
    }

    /// Glob pattern matching every key in this namespace.
    pub fn pattern(self) -> String {
        format!("{}{KEY_DELIMITER}*", self.as_str())
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Join `namespace` and `args` with [`KEY_DELIMITER`], escaping each
    /// argument.
    pub fn build(namespace: impl Display, args: &[&dyn Display]) -> Self {
        let mut key = namespace.to_string();
        for arg in args {
            key.push(KEY_DELIMITER);
            // Writing into a String cannot fail.
            let _ = write!(EscapedArg(&mut key), "{arg}");
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading namespace segment.
    pub fn namespace(&self) -> &str {
        self.0
            .split_once(KEY_DELIMITER)
            .map_or(self.0.as_str(), |(namespace, _)| namespace)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Writes into a key, percent-escaping `%` and the delimiter.
struct EscapedArg<'a>(&'a mut String);

impl fmt::Write for EscapedArg<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            match c {
                '%' => self.0.push_str("%25"),
                KEY_DELIMITER => self.0.push_str("%3A"),
                c => self.0.push(c),
            }
        }
        Ok(())
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Build a [`CacheKey`] from a namespace and any number of `Display` arguments.
///
/// ```
/// use penlog::cache_key;
///
/// let key = cache_key!("posts", "all", 1, 10);
/// assert_eq!(key.as_str(), "posts:all:1:10");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($namespace:expr $(, $arg:expr)* $(,)?) => {
        $crate::cache::CacheKey::build($namespace, &[$(&$arg as &dyn ::std::fmt::Display),*])
    };
}
