//! `recipe` command.

use super::helpers::parse_version_arg;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::recipe::update_recipe_file;
use std::path::Path;

/// Rewrite a recipe file's version and sha256 lines
pub(super) fn execute_recipe(
    file: &Path,
    version: &str,
    sha256: &str,
    reset_build_number: bool,
    config: &RuntimeConfig,
) -> Result<()> {
    let version = parse_version_arg("--version", version)?;

    if update_recipe_file(file, &version, sha256, reset_build_number)? {
        config.success_println(&format!("Updated {} to {}", file.display(), version));
    } else {
        let _ = config
            .output()
            .info(&format!("{} already at {}", file.display(), version));
    }
    Ok(())
}
