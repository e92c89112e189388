//! Document library: PDF files under a root directory, grouped by folder.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, AppResult};

pub const ROOT_GROUP_NAME: &str = "Library";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub display_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryGroup {
    pub display_name: String,
    pub path: PathBuf,
    /// Groups without documents start collapsed.
    pub expanded: bool,
    pub documents: Vec<LibraryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LibraryTree {
    pub groups: Vec<LibraryGroup>,
}

impl LibraryTree {
    pub fn document_count(&self) -> usize {
        self.groups.iter().map(|group| group.documents.len()).sum()
    }
}

/// Scans `root` one level deep. The root group comes first and is always
/// expanded; each immediate subdirectory follows with an upper-cased name.
/// A missing root is created.
pub fn list_documents(root: impl AsRef<Path>) -> AppResult<LibraryTree> {
    let root = root.as_ref();
    if !root.exists() {
        fs::create_dir_all(root).map_err(|source| {
            AppError::io_with_context(
                source,
                format!("failed to create library directory: {}", root.display()),
            )
        })?;
    }

    let mut groups = vec![LibraryGroup {
        display_name: ROOT_GROUP_NAME.to_string(),
        path: root.to_path_buf(),
        expanded: true,
        documents: pdf_files(root)?,
    }];

    for dir in subdirectories(root)? {
        let documents = pdf_files(&dir)?;
        let display_name = dir
            .file_name()
            .map(|name| name.to_string_lossy().to_uppercase())
            .unwrap_or_default();
        groups.push(LibraryGroup {
            display_name,
            expanded: !documents.is_empty(),
            path: dir,
            documents,
        });
    }

    let tree = LibraryTree { groups };
    debug!(
        root = %root.display(),
        groups = tree.groups.len(),
        documents = tree.document_count(),
        "library scanned"
    );
    Ok(tree)
}

fn read_dir_sorted(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| {
        AppError::io_with_context(source, format!("failed to read directory: {}", dir.display()))
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    paths.sort();
    Ok(paths)
}

fn subdirectories(dir: &Path) -> AppResult<Vec<PathBuf>> {
    Ok(read_dir_sorted(dir)?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect())
}

fn pdf_files(dir: &Path) -> AppResult<Vec<LibraryEntry>> {
    Ok(read_dir_sorted(dir)?
        .into_iter()
        .filter(|path| path.is_file() && has_pdf_extension(path))
        .filter_map(|path| {
            let display_name = path.file_name()?.to_string_lossy().into_owned();
            Some(LibraryEntry { display_name, path })
        })
        .collect())
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{ROOT_GROUP_NAME, list_documents};
    use crate::testing::unique_temp_path;

    #[test]
    fn groups_root_and_subdirectories() {
        let root = unique_temp_path("library");
        fs::create_dir_all(root.join("papers")).expect("papers dir");
        fs::create_dir_all(root.join("empty")).expect("empty dir");
        fs::write(root.join("b.pdf"), b"%PDF-").expect("b.pdf");
        fs::write(root.join("a.PDF"), b"%PDF-").expect("a.PDF");
        fs::write(root.join("notes.txt"), b"text").expect("notes.txt");
        fs::write(root.join("papers").join("paper.pdf"), b"%PDF-").expect("paper.pdf");

        let tree = list_documents(&root).expect("library should scan");

        let names: Vec<&str> = tree
            .groups
            .iter()
            .map(|group| group.display_name.as_str())
            .collect();
        assert_eq!(names, vec![ROOT_GROUP_NAME, "EMPTY", "PAPERS"]);

        let root_docs: Vec<&str> = tree.groups[0]
            .documents
            .iter()
            .map(|doc| doc.display_name.as_str())
            .collect();
        assert_eq!(root_docs, vec!["a.PDF", "b.pdf"]);
        assert!(tree.groups[0].expanded);
        assert!(!tree.groups[1].expanded);
        assert!(tree.groups[2].expanded);
        assert_eq!(
            tree.groups[2].documents[0].path,
            root.join("papers").join("paper.pdf")
        );
        assert_eq!(tree.document_count(), 3);

        fs::remove_dir_all(&root).expect("library should be removed");
    }

    #[test]
    fn missing_root_is_created() {
        let root = unique_temp_path("library_missing");
        let tree = list_documents(&root).expect("library should scan");

        assert!(root.is_dir());
        assert_eq!(tree.groups.len(), 1);
        assert_eq!(tree.document_count(), 0);

        fs::remove_dir_all(&root).expect("library should be removed");
    }
}
