use common::media::base_path;

/// Reduce a catalog field value to the bare object name it refers to, when
/// the value belongs to this blob store.
///
/// Accepts bare object names and full public URLs under the configured base;
/// foreign URLs (marketplace links, CDNs of other systems) return `None` and
/// are never considered during reconciliation.
pub fn strip_public_prefix<'a>(
    value: &'a str,
    public_base_url: &str,
    folder: Option<&str>,
) -> Option<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let base = public_base_url.trim_end_matches('/');
    let mut rest = if value.starts_with("http://") || value.starts_with("https://") {
        value.strip_prefix(base)?.strip_prefix('/')?
    } else {
        value
    };

    if let Some(folder) = folder
        && let Some(stripped) = rest
            .strip_prefix(folder)
            .and_then(|r| r.strip_prefix('/'))
    {
        rest = stripped;
    }

    (!rest.is_empty()).then_some(rest)
}

/// Canonical path of a catalog field value, or `None` when the value does
/// not point at this store.
pub fn normalize_reference(
    value: &str,
    public_base_url: &str,
    folder: Option<&str>,
) -> Option<String> {
    let name = strip_public_prefix(value, public_base_url, folder)?;
    let base = base_path(name);
    (!base.is_empty()).then_some(base)
}
