//! Filename normalization
//!
//! Maps raw, user-selected filenames to the canonical names that are put on the
//! wire: whitespace runs in the base name become a single underscore and the
//! whole name is lower-cased.

use crate::config::NameCollision;
use std::collections::HashSet;

/// Split a filename into base and extension at the last `.`
///
/// A name without a dot, or whose only dot is the leading one (`.env`), has no
/// extension.
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, Some(ext)),
        _ => (name, None),
    }
}

/// Normalize a raw filename into its canonical form
///
/// Pure and idempotent: `normalize(&normalize(x)) == normalize(x)`.
///
/// # Examples
///
/// ```
/// use batch_uploader::normalize::normalize;
///
/// assert_eq!(normalize("My Photo.PNG"), "my_photo.png");
/// assert_eq!(normalize("Scan   2024  final"), "scan_2024_final");
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    let (base, extension) = split_extension(raw);

    let mut out = String::with_capacity(raw.len());
    let mut in_whitespace = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }

    if let Some(ext) = extension {
        out.push('.');
        out.push_str(ext);
    }

    out.to_lowercase()
}

/// Normalize every name of a batch and resolve collisions between the results
///
/// With [`NameCollision::Rename`], later duplicates get `_1`, `_2`, ... appended to
/// their base name until unique. With [`NameCollision::Keep`], duplicates are left
/// as they are.
pub fn canonicalize_batch<'a, I>(names: I, policy: NameCollision) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut canonical = Vec::new();

    for raw in names {
        let name = normalize(raw);
        let name = match policy {
            NameCollision::Keep => {
                if seen.contains(&name) {
                    tracing::warn!(name = %name, "duplicate canonical name kept");
                }
                name
            }
            NameCollision::Rename => disambiguate(name, &seen),
        };
        seen.insert(name.clone());
        canonical.push(name);
    }

    canonical
}

fn disambiguate(name: String, seen: &HashSet<String>) -> String {
    if !seen.contains(&name) {
        return name;
    }

    let (base, extension) = split_extension(&name);
    let mut counter = 1u32;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{}_{}.{}", base, counter, ext),
            None => format!("{}_{}", base, counter),
        };
        if !seen.contains(&candidate) {
            tracing::debug!(from = %name, to = %candidate, "renamed colliding filename");
            return candidate;
        }
        counter += 1;
    }
}
