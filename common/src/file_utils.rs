//! File utility functions for listing and filtering files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Image extensions accepted for volume slices.
pub const SLICE_EXTENSIONS: &[&str] = &["png"];

/// Returns paths to all files in a directory matching the given extensions,
/// sorted by path. Extensions are matched case-insensitively.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| {
            if !path.is_file() {
                return false;
            }
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
            extensions.contains(&ext.to_lowercase().as_str())
        })
        .collect();
    files.sort();

    Ok(files)
}

/// Returns paths to all slice images in the given directory.
pub fn slice_image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    files_with_extensions(dir, SLICE_EXTENSIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_output_path;

    #[test]
    fn missing_directory_is_empty() -> anyhow::Result<()> {
        let files = files_with_extensions(Path::new("definitely/not/here"), &["png"])?;
        assert!(files.is_empty());
        Ok(())
    }

    #[test]
    fn filters_by_extension() -> anyhow::Result<()> {
        let dir = test_output_path("file_utils_filter");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("IM1.png"), b"")?;
        fs::write(dir.join("IM2.PNG"), b"")?;
        fs::write(dir.join("notes.txt"), b"")?;

        let files = slice_image_files(&dir)?;
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.extension().is_some_and(|e| e != "txt")));
        Ok(())
    }
}
