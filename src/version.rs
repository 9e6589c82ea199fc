//! Build metadata for `sluice-sim --version`.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const UNKNOWN: &str = "unknown";

// vergen substitutes this when git metadata cannot be collected.
const IDEMPOTENT: &str = "VERGEN_IDEMPOTENT_OUTPUT";

fn or_unknown(value: Option<&'static str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() && v != IDEMPOTENT => v,
        _ => UNKNOWN,
    }
}

/// Git branch at build time, or "unknown".
pub fn git_branch() -> &'static str {
    or_unknown(option_env!("VERGEN_GIT_BRANCH"))
}

/// Short git commit SHA at build time, or "unknown".
pub fn git_sha() -> &'static str {
    let sha = or_unknown(option_env!("VERGEN_GIT_SHA"));
    &sha[..7.min(sha.len())]
}

/// Whether the working tree was dirty at build time.
pub fn git_dirty() -> bool {
    option_env!("VERGEN_GIT_DIRTY") == Some("true")
}

/// Full version string: `{version}+{branch}.{sha}`, with a `.dirty` suffix
/// for dirty trees.
///
/// Examples:
/// - `0.1.0+main.abc1234`
/// - `0.1.0+unknown.unknown` (built outside a git checkout)
pub fn version_string() -> String {
    let dirty_suffix = if git_dirty() { ".dirty" } else { "" };
    format!(
        "{PKG_VERSION}+{}.{}{dirty_suffix}",
        git_branch(),
        git_sha()
    )
}
