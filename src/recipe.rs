//! Feedstock recipe rewriting.
//!
//! A recipe is treated as plain lines. Only the `{% set version = "..." %}`
//! declaration and the `sha256:` value change; every other byte, line
//! terminators included, passes through untouched.

use crate::error::{RecipeError, Result};
use crate::version::Version;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static VERSION_LINE: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r#"^\s*\{%-?\s*set\s+version\s*=\s*["'](?P<value>[^"']*)["']"#)
});

static DIGEST_LINE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(?P<key>\s*(?:-\s*)?sha256:)(?P<gap>\s*)(?P<value>[^\s#]*)"));

static BUILD_NUMBER_LINE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\s*number:\s*(?P<value>\d+)"));

fn pattern(cell: &'static LazyLock<std::result::Result<Regex, regex::Error>>) -> Result<&'static Regex> {
    cell.as_ref()
        .map_err(|e| anyhow::anyhow!("recipe pattern failed to compile: {e}").into())
}

/// Split into lines keeping each terminator with its line
fn split_lines(text: &str) -> Vec<(&str, &str)> {
    text.split_inclusive('\n')
        .map(|raw| {
            if let Some(body) = raw.strip_suffix("\r\n") {
                (body, "\r\n")
            } else if let Some(body) = raw.strip_suffix('\n') {
                (body, "\n")
            } else {
                (raw, "")
            }
        })
        .collect()
}

fn splice(line: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(line.len() + replacement.len());
    out.push_str(&line[..start]);
    out.push_str(replacement);
    out.push_str(&line[end..]);
    out
}

/// Whether `digest` is a 64 character hex sha256
pub fn is_sha256(digest: &str) -> bool {
    digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Replace the version declaration and sha256 value in `text`.
///
/// Only the first matching line of each kind is touched.
pub fn update_recipe(text: &str, version: &Version, sha256: &str) -> Result<String> {
    if !is_sha256(sha256) {
        return Err(RecipeError::InvalidDigest {
            digest: sha256.to_string(),
        }
        .into());
    }

    let version_re = pattern(&VERSION_LINE)?;
    let digest_re = pattern(&DIGEST_LINE)?;
    let version_text = version.to_string();

    let mut version_done = false;
    let mut digest_done = false;
    let mut out = String::with_capacity(text.len() + 16);

    for (body, terminator) in split_lines(text) {
        let mut replaced = None;

        if !version_done
            && let Some(value) = version_re.captures(body).and_then(|c| c.name("value"))
        {
            replaced = Some(splice(body, value.start(), value.end(), &version_text));
            version_done = true;
        } else if !digest_done && let Some(caps) = digest_re.captures(body) {
            if let (Some(gap), Some(value)) = (caps.name("gap"), caps.name("value")) {
                // `sha256:` with nothing after it still needs a separating space
                let new_value = if gap.as_str().is_empty() {
                    format!(" {}", sha256)
                } else {
                    sha256.to_string()
                };
                replaced = Some(splice(body, value.start(), value.end(), &new_value));
                digest_done = true;
            }
        }

        out.push_str(replaced.as_deref().unwrap_or(body));
        out.push_str(terminator);
    }

    if !version_done {
        return Err(RecipeError::MissingVersionLine.into());
    }
    if !digest_done {
        return Err(RecipeError::MissingDigestLine.into());
    }
    Ok(out)
}

/// Set the first `number:` build line to 0, if there is one
pub fn reset_build_number(text: &str) -> Result<String> {
    let number_re = pattern(&BUILD_NUMBER_LINE)?;
    let mut done = false;
    let mut out = String::with_capacity(text.len());

    for (body, terminator) in split_lines(text) {
        match number_re.captures(body).and_then(|c| c.name("value")) {
            Some(value) if !done => {
                out.push_str(&splice(body, value.start(), value.end(), "0"));
                done = true;
            }
            _ => out.push_str(body),
        }
        out.push_str(terminator);
    }

    Ok(out)
}

/// Rewrite a recipe file in place. Returns whether its content changed.
pub fn update_recipe_file(
    path: &Path,
    version: &Version,
    sha256: &str,
    reset_build: bool,
) -> Result<bool> {
    let original = std::fs::read_to_string(path)?;
    let mut updated = update_recipe(&original, version, sha256)?;
    if reset_build {
        updated = reset_build_number(&updated)?;
    }

    if updated == original {
        log::info!("{} already at {}", path.display(), version);
        return Ok(false);
    }

    std::fs::write(path, &updated)?;
    log::info!("updated {} to {}", path.display(), version);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;

    const DIGEST: &str = "3f0d6b1a3c9e2b8f4d7a6e5c1b0a9f8e7d6c5b4a3f2e1d0c9b8a7f6e5d4c3b2a";

    const RECIPE: &str = r#"{% set name = "pythresh" %}
{% set version = "0.2.3" %}

package:
  name: {{ name|lower }}
  version: {{ version }}

source:
  url: https://pypi.io/packages/source/{{ name[0] }}/{{ name }}/pythresh-{{ version }}.tar.gz
  sha256: 0000000000000000000000000000000000000000000000000000000000000000

build:
  noarch: python
  number: 2
"#;

    #[test]
    fn test_only_version_and_digest_lines_change() {
        let updated = update_recipe(RECIPE, &Version::new(0, 2, 4), DIGEST).expect("update");

        let before: Vec<&str> = RECIPE.lines().collect();
        let after: Vec<&str> = updated.lines().collect();
        assert_eq!(before.len(), after.len());

        let changed: Vec<usize> = (0..before.len()).filter(|&i| before[i] != after[i]).collect();
        assert_eq!(changed, vec![1, 9]);
        assert_eq!(after[1], r#"{% set version = "0.2.4" %}"#);
        assert_eq!(after[9], format!("  sha256: {}", DIGEST));
        assert!(updated.ends_with("number: 2\n"));
    }

    #[test]
    fn test_crlf_and_missing_trailing_newline_preserved() {
        let text = "{% set version = '1.0.0' %}\r\nsource:\r\n  sha256: abc  # sdist";
        let updated = update_recipe(text, &Version::new(1, 0, 1), DIGEST).expect("update");
        assert_eq!(
            updated,
            format!("{{% set version = '1.0.1' %}}\r\nsource:\r\n  sha256: {}  # sdist", DIGEST)
        );
    }

    #[test]
    fn test_empty_digest_value_gets_space() {
        let text = "{% set version = \"1.0.0\" %}\nsha256:\n";
        let updated = update_recipe(text, &Version::new(1, 0, 1), DIGEST).expect("update");
        assert_eq!(
            updated,
            format!("{{% set version = \"1.0.1\" %}}\nsha256: {}\n", DIGEST)
        );
    }

    #[test]
    fn test_only_first_digest_line_changes() {
        let text = "{% set version = \"1.0.0\" %}\n  sha256: aa\n  sha256: bb\n";
        let updated = update_recipe(text, &Version::new(1, 0, 1), DIGEST).expect("update");
        assert!(updated.ends_with("  sha256: bb\n"));
    }

    #[test]
    fn test_missing_lines_are_errors() {
        let err = update_recipe("sha256: aa\n", &Version::new(1, 0, 0), DIGEST).expect_err("no version");
        assert!(matches!(err, ReleaseError::Recipe(RecipeError::MissingVersionLine)));

        let err = update_recipe("{% set version = \"1\" %}\n", &Version::new(1, 0, 0), DIGEST)
            .expect_err("no digest");
        assert!(matches!(err, ReleaseError::Recipe(RecipeError::MissingDigestLine)));
    }

    #[test]
    fn test_invalid_digest_rejected() {
        let err = update_recipe(RECIPE, &Version::new(0, 2, 4), "xyz").expect_err("bad digest");
        assert!(matches!(err, ReleaseError::Recipe(RecipeError::InvalidDigest { .. })));
    }

    #[test]
    fn test_reset_build_number() {
        let updated = reset_build_number(RECIPE).expect("reset");
        assert!(updated.contains("  number: 0\n"));
        assert_eq!(updated.len(), RECIPE.len());
        assert_eq!(reset_build_number("no build\n").expect("noop"), "no build\n");
    }

    #[test]
    fn test_update_recipe_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("meta.yaml");
        std::fs::write(&path, RECIPE).expect("write");

        assert!(update_recipe_file(&path, &Version::new(0, 2, 4), DIGEST, true).expect("update"));
        let written = std::fs::read_to_string(&path).expect("read");
        assert!(written.contains("{% set version = \"0.2.4\" %}"));
        assert!(written.contains("number: 0"));

        assert!(!update_recipe_file(&path, &Version::new(0, 2, 4), DIGEST, true).expect("noop"));
    }
}
