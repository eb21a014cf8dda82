//! Supported Spine export versions.

/// Spine major version accepted by the loaders.
pub const SPINE_EXPORT_MAJOR: u32 = 4;

/// Spine minor version the solver semantics are taken from.
pub const SPINE_EXPORT_MINOR: u32 = 3;

/// Returns `true` when an exported `"x.y.zz"` version string belongs to a supported major
/// version.
pub fn is_supported_spine_version(value: &str) -> bool {
    value
        .split('.')
        .next()
        .and_then(|major| major.parse::<u32>().ok())
        .is_some_and(|major| major == SPINE_EXPORT_MAJOR)
}
