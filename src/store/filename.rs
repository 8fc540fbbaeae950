//! Filename sanitization and numbered-variant naming.

use std::path::{Component, Path};

/// Sanitizes a filename or single folder name for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Splits `name` into stem and extension at the last dot.
///
/// The extension keeps its dot. A leading dot (hidden file) is part of the
/// stem, not an extension.
pub(crate) fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if name[..pos].chars().any(|c| c != '.') => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

/// Builds the numbered variant of `name`: `face.png` → `face_2.png`.
pub(crate) fn numbered_name(name: &str, suffix: u64) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem}_{suffix}{ext}")
}
