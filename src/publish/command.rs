//! External tool invocation.

use crate::error::{PublishError, Result};
use crate::version::Version;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Lines of stderr kept in a failure report
const STDERR_TAIL_LINES: usize = 20;

/// Captured output of a successful command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// A resolved program plus arguments, run in a fixed directory
#[derive(Debug, Clone)]
pub struct ToolCommand {
    step: String,
    program: PathBuf,
    args: Vec<String>,
    cwd: PathBuf,
}

impl ToolCommand {
    /// Build a command from a configured template.
    ///
    /// `{package}` and `{version}` are substituted in every argument. Plain
    /// path arguments containing glob characters are expanded relative to
    /// `cwd`; a pattern that matches nothing is an error.
    pub fn from_template(
        step: &str,
        template: &[String],
        cwd: &Path,
        package: &str,
        version: &Version,
    ) -> Result<Self> {
        let (program, rest) = template.split_first().ok_or_else(|| PublishError::EmptyCommand {
            step: step.to_string(),
        })?;

        let version_text = version.to_string();
        let substitute =
            |arg: &str| arg.replace("{package}", package).replace("{version}", &version_text);

        let mut args = Vec::with_capacity(rest.len());
        for raw in rest {
            let arg = substitute(raw);
            if is_glob_arg(&arg) {
                args.extend(expand_glob(cwd, &arg)?);
            } else {
                args.push(arg);
            }
        }

        Ok(Self {
            step: step.to_string(),
            program: resolve_program(cwd, &substitute(program))?,
            args,
            cwd: cwd.to_path_buf(),
        })
    }

    /// Command line for logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Arguments after expansion
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion, failing on a non-zero exit
    pub async fn run(&self) -> Result<CommandOutput> {
        log::info!("[{}] {}", self.step, self.display());

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in stdout.lines() {
            log::debug!("[{}] {}", self.step, line);
        }

        if !output.status.success() {
            return Err(PublishError::CommandFailed {
                command: self.display(),
                status: output.status.to_string(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            }
            .into());
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

fn is_glob_arg(arg: &str) -> bool {
    !arg.starts_with('-')
        && !arg.chars().any(char::is_whitespace)
        && arg.contains(['*', '?', '['])
}

fn expand_glob(cwd: &Path, arg: &str) -> Result<Vec<String>> {
    let pattern = cwd.join(arg).to_string_lossy().into_owned();
    let mut paths: Vec<String> = glob::glob(&pattern)
        .map_err(|_| PublishError::ArtifactNotFound {
            pattern: pattern.clone(),
        })?
        .filter_map(std::result::Result::ok)
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    if paths.is_empty() {
        return Err(PublishError::ArtifactNotFound { pattern }.into());
    }
    paths.sort();
    Ok(paths)
}

fn resolve_program(cwd: &Path, program: &str) -> Result<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return Ok(cwd.join(program));
    }
    which::which(program).map_err(|_| {
        PublishError::ToolNotFound {
            program: program.to_string(),
        }
        .into()
    })
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
