use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::is_not_found;

/// Children of `dir` in name order, or nothing if `dir` does not exist.
pub fn list_or_empty(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if is_not_found(&e) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_or_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("woo");
        assert!(list_or_empty(&d).unwrap().is_empty());
        fs::create_dir(&d).unwrap();
        assert!(list_or_empty(&d).unwrap().is_empty());
        fs::write(d.join("yay"), b"").unwrap();
        fs::write(d.join("abc"), b"").unwrap();
        assert_eq!(list_or_empty(&d).unwrap(), vec![d.join("abc"), d.join("yay")]);
    }
}
