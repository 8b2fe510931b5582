//! Utility functions and helpers.

pub mod http;
pub mod log;

use url::Url;

/// Join a relative endpoint path onto a base URL.
///
/// The base is treated as a directory even without a trailing slash, so
/// `https://host/api` + `v1/x` gives `https://host/api/v1/x`.
pub fn endpoint(base: &str, path: &str) -> crate::error::Result<Url> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}
