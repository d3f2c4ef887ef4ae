// src/remote/quote.rs

//! POSIX shell quoting and remote path joining.
//!
//! Remote hosts are always POSIX, so paths are handled as strings rather
//! than through `std::path`, whose separator depends on the local platform.

/// Quote `s` so a POSIX shell reads it back as a single literal word.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(is_safe_char) {
        return s.to_string();
    }
    // Close the quote, emit an escaped quote, reopen.
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '_' | '-')
}

/// Quote each item and join with spaces.
pub fn quote_all<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| shell_quote(s.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join remote path segments with `/`, without doubling separators.
pub fn join_remote(base: &str, parts: &[&str]) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    if out.is_empty() && base.starts_with('/') {
        out.push('/');
    }
    for part in parts {
        let part = part.trim_matches('/');
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_are_left_alone() {
        assert_eq!(shell_quote("/data/expA/run_0007"), "/data/expA/run_0007");
        assert_eq!(shell_quote("file-1.graw"), "file-1.graw");
    }

    #[test]
    fn awkward_names_are_single_quoted() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("my run"), "'my run'");
        assert_eq!(shell_quote("a;rm -rf /"), "'a;rm -rf /'");
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn joins_remote_paths() {
        assert_eq!(join_remote("/data/", &["expA", "run_0007"]), "/data/expA/run_0007");
        assert_eq!(join_remote("/data", &["/expA/", ""]), "/data/expA");
        assert_eq!(join_remote("/", &["x"]), "/x");
    }

    #[test]
    fn quote_all_joins_with_spaces() {
        assert_eq!(quote_all(["a b", "c"]), "'a b' c");
    }
}
