//! Secret scrubbing for anything that reaches a log line or a PR comment.

use std::sync::LazyLock;

use regex::Regex;

/// Replacement for every occurrence of a scrubbed secret.
pub const MASK: &str = "***";

static AUTH_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--auth-token=(\S+)").expect("valid auth token regex"));

/// Remove the `--auth-token=<token>` secret from `input`.
///
/// The token is captured from the first `--auth-token=` flag, then every
/// literal occurrence of it anywhere in the text is masked, including copies
/// that appear without the flag (in a serialized error, for instance).
///
/// # Examples
///
/// ```
/// use appdiff_text::scrub::scrub_secrets;
///
/// let out = scrub_secrets("argocd app diff web --auth-token=s3cr3t; token was s3cr3t");
/// assert_eq!(out, "argocd app diff web --auth-token=***; token was ***");
/// ```
pub fn scrub_secrets(input: &str) -> String {
    match AUTH_TOKEN.captures(input).and_then(|c| c.get(1)) {
        Some(token) => input.replace(token.as_str(), MASK),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_token_is_untouched() {
        let input = "argocd app diff web --server=argocd.acme.dev";
        assert_eq!(scrub_secrets(input), input);
    }

    #[test]
    fn masks_every_occurrence() {
        let input = "cmd --auth-token=abc.def-123 --server=x\nstderr: bad token abc.def-123\n{\"cmd\":\"abc.def-123\"}";
        let out = scrub_secrets(input);
        assert!(!out.contains("abc.def-123"));
        assert_eq!(out.matches(MASK).count(), 3);
    }

    #[test]
    fn token_ends_at_whitespace() {
        let out = scrub_secrets("--auth-token=tok --local=apps/web");
        assert_eq!(out, "--auth-token=*** --local=apps/web");
    }

    #[test]
    fn scrubbing_twice_is_stable() {
        let once = scrub_secrets("--auth-token=tok and tok");
        // `***` is itself a valid capture, so the second pass masks the mask.
        assert_eq!(scrub_secrets(&once), once);
    }
}
