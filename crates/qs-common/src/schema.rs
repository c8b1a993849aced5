//! Version stamp shared by settings files and CLI reports.
//!
//! Readers accept any document whose major version matches [`SCHEMA_VERSION`];
//! minor and patch bumps only add optional fields.

pub const SCHEMA_VERSION: &str = "1.0.0";

/// `MAJOR.MINOR.PATCH`, each part a plain decimal number.
pub fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.trim().splitn(3, '.').map(|p| p.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next()??;
    let patch = parts.next()??;
    Some((major, minor, patch))
}

/// Whether a document stamped with `version` can be read by this build.
pub fn is_compatible(version: &str) -> bool {
    match (parse_version(SCHEMA_VERSION), parse_version(version)) {
        (Some((current, _, _)), Some((other, _, _))) => current == other,
        _ => false,
    }
}
