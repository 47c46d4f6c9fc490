//! Identifier normalization for route keys.

/// Converts an internal identifier to kebab-case with acronym handling.
///
/// Two insertion passes, then lowercase: first a `-` between a lowercase
/// letter or digit and an uppercase letter, then a `-` between an uppercase
/// run and a trailing uppercase-lowercase pair.
///
/// # Example
///
/// ```
/// use tango_router::kebab;
///
/// assert_eq!(kebab("getUserID"), "get-user-id");
/// assert_eq!(kebab("HTTPServer"), "http-server");
/// assert_eq!(kebab("v2Parser"), "v2-parser");
/// ```
#[must_use]
pub fn kebab(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();

    let mut pass_one = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0
            && c.is_ascii_uppercase()
            && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit())
        {
            pass_one.push('-');
        }
        pass_one.push(c);
    }

    let chars: Vec<char> = pass_one.chars().collect();
    let mut pass_two = String::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0
            && c.is_ascii_uppercase()
            && chars[i - 1].is_ascii_uppercase()
            && chars.get(i + 1).is_some_and(char::is_ascii_lowercase)
        {
            pass_two.push('-');
        }
        pass_two.push(c);
    }

    pass_two.to_ascii_lowercase()
}

/// Builds a route key from path segments: each kebab-normalized, joined
/// with `.`.
///
/// # Example
///
/// ```
/// use tango_router::route_key;
///
/// let key = route_key(["userAccounts", "auth", "getToken"]);
/// assert_eq!(key, "user-accounts.auth.get-token");
/// ```
#[must_use]
pub fn route_key<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| kebab(s.as_ref()))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_simple() {
        assert_eq!(kebab("getUser"), "get-user");
        assert_eq!(kebab("createPost"), "create-post");
    }

    #[test]
    fn test_kebab_acronyms() {
        assert_eq!(kebab("getUserID"), "get-user-id");
        assert_eq!(kebab("HTTPServer"), "http-server");
        assert_eq!(kebab("APIKey"), "api-key");
    }

    #[test]
    fn test_kebab_digits() {
        assert_eq!(kebab("v2Parser"), "v2-parser");
        assert_eq!(kebab("md5Sum"), "md5-sum");
    }

    #[test]
    fn test_kebab_already_plain() {
        assert_eq!(kebab("users"), "users");
        assert_eq!(kebab("get-token"), "get-token");
        assert_eq!(kebab(""), "");
    }

    #[test]
    fn test_route_key_join() {
        assert_eq!(route_key(["users", "getProfile"]), "users.get-profile");
        assert_eq!(route_key(["ping"]), "ping");
    }
}
