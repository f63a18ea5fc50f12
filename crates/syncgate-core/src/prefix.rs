//! Prefix translation and tenant isolation
//!
//! Every key a caller supplies is relative to their root. The functions here
//! join it with the root, normalize separators and refuse anything that
//! would land outside that root. No storage call happens with a key that
//! did not pass through [`resolve_key`] or [`resolve_prefix`].

use crate::context::{KeyScope, UserContext};
use thiserror::Error;

/// Maximum absolute key length accepted by S3-compatible stores
pub const MAX_KEY_LENGTH: usize = 1024;

/// Why a key could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Key is empty or normalizes to nothing
    #[error("key is empty")]
    Empty,

    /// Key is longer than the store accepts
    #[error("key exceeds {MAX_KEY_LENGTH} bytes")]
    TooLong,

    /// Key escapes the caller's root, or the root does not exist
    #[error("key is outside the caller's scope")]
    OutOfScope,
}

/// Resolve a relative object key to an absolute storage key
pub fn resolve_key(relative: &str, ctx: &UserContext, scope: KeyScope) -> Result<String, ScopeError> {
    if relative.is_empty() {
        return Err(ScopeError::Empty);
    }
    let (root, key) = resolve(relative, ctx, scope)?;
    if key.len() == root.len() {
        return Err(ScopeError::Empty);
    }
    Ok(key)
}

/// Resolve a relative prefix; an empty prefix is the whole root
pub fn resolve_prefix(relative: &str, ctx: &UserContext, scope: KeyScope) -> Result<String, ScopeError> {
    resolve(relative, ctx, scope).map(|(_, key)| key)
}

/// Strip the caller's root from an absolute key
pub fn relativize<'a>(absolute: &'a str, root: &str) -> &'a str {
    absolute.strip_prefix(root).unwrap_or(absolute)
}

fn resolve<'a>(
    relative: &str,
    ctx: &'a UserContext,
    scope: KeyScope,
) -> Result<(&'a str, String), ScopeError> {
    let root = ctx.root(scope).ok_or(ScopeError::OutOfScope)?;

    // Roots must be empty or a complete directory, otherwise "users/a"
    // would also match "users/ab"
    if !root.is_empty() && !root.ends_with('/') {
        return Err(ScopeError::OutOfScope);
    }
    if relative.starts_with('/') || relative.starts_with('\\') {
        return Err(ScopeError::OutOfScope);
    }
    if relative.chars().any(char::is_control) {
        return Err(ScopeError::OutOfScope);
    }

    let key = normalize(&format!("{}{}", root, relative))?;
    if key.len() > MAX_KEY_LENGTH {
        return Err(ScopeError::TooLong);
    }
    if !key.starts_with(root) {
        return Err(ScopeError::OutOfScope);
    }
    Ok((root, key))
}

/// Normalize separators, dropping empty and `.` segments
///
/// A trailing `/` is preserved. Any `..` segment is rejected outright.
pub fn normalize(path: &str) -> Result<String, ScopeError> {
    let unified = path.replace('\\', "/");
    let trailing = unified.ends_with('/');

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(ScopeError::OutOfScope),
            s => segments.push(s),
        }
    }

    let mut normalized = segments.join("/");
    if trailing && !normalized.is_empty() {
        normalized.push('/');
    }
    Ok(normalized)
}
