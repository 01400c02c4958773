const fn release_or_cargo_version(opt: Option<&'static str>) -> &'static str {
    match opt {
        Some(val) => val,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Version reported by `/api/version` and `/health`. Overridable at build time
/// through `STATUS_PROXY_VERSION` so deploys can stamp a release tag.
pub const VERSION: &str = release_or_cargo_version(option_env!("STATUS_PROXY_VERSION"));
