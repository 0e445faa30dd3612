//! Storage key helpers shared by every backend.

use uuid::Uuid;

const MAX_FILE_NAME_LEN: usize = 128;

/// Build the storage key for a resource file: `resources/{id}/{file_name}`.
pub fn resource_storage_key(resource_id: Uuid, file_name: &str) -> String {
    format!("resources/{}/{}", resource_id, sanitize_file_name(file_name))
}

/// Reduce a client-supplied file name to a safe single path segment.
///
/// Directory components are dropped, anything outside `[A-Za-z0-9._-]`
/// becomes `_`, and leading dots are stripped.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    let mut name = if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    };

    if name.len() > MAX_FILE_NAME_LEN {
        // keep the extension when truncating
        let ext = file_extension(&name).map(|e| format!(".{}", e));
        let keep = MAX_FILE_NAME_LEN - ext.as_ref().map_or(0, |e| e.len());
        name.truncate(keep);
        if let Some(ext) = ext {
            name.push_str(&ext);
        }
    }

    name
}

/// Lowercased extension without the dot, if any
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
