//! Translation of KongFiles into Admin API file records

use crate::backend::FileRecord;
use crate::crd::{FileKind, KongFile, Resource};

/// Portal path of a file: `<kind prefix>/<spec.path>/<spec.name>`
///
/// Empty when the kind is not set, which the Admin API client rejects.
pub fn file_path(file: &KongFile) -> String {
    match file.spec.kind {
        Some(kind) => format!("{}/{}/{}", kind.path_prefix(), file.spec.path, file.spec.name),
        None => String::new(),
    }
}

/// Rendered contents of a file
///
/// Content pages get a front-matter block with their title and layout;
/// everything else is stored verbatim.
pub fn file_contents(file: &KongFile) -> String {
    match file.spec.kind {
        Some(FileKind::Content) => format!(
            "---\ntitle: {}\nlayout: {}\n---\n{}",
            file.spec.title, file.spec.layout, file.spec.content
        ),
        Some(FileKind::Specification) | Some(FileKind::Asset) => file.spec.content.clone(),
        None => String::new(),
    }
}

/// Build the Admin API record for a KongFile
pub fn build_file_record(file: &KongFile) -> FileRecord {
    FileRecord::new(file_path(file), file_contents(file))
}

/// Build the Admin API record for any managed resource
pub fn build_record(resource: &Resource) -> FileRecord {
    match resource {
        Resource::File(file) => build_file_record(file),
    }
}
