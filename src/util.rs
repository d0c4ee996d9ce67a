use pulldown_cmark::escape::escape_html;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// HTML-escapes plain text (front-matter values) for templates.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a `String` can't fail.
    let _ = escape_html(&mut out, text);
    out
}

/// Recursively copies the contents of `src` into `dst`, creating directories
/// as needed. A missing `src` copies nothing. Returns the number of files
/// copied.
pub fn copy_dir(src: &Path, dst: &Path) -> io::Result<usize> {
    if !src.exists() {
        return Ok(0);
    }

    let mut copied = 0;
    for result in WalkDir::new(src) {
        let entry = result.map_err(io::Error::from)?;
        // strip_prefix() can't fail; every entry is under `src`.
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| io_error(e, entry.path()))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| io_error(e, entry.path()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn io_error(err: io::Error, path: &Path) -> io::Error {
    io::Error::new(err.kind(), format!("copying `{}`: {}", path.display(), err))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_escape() {
        assert_eq!("Tom &amp; Jerry &lt;3", escape("Tom & Jerry <3"));
    }

    #[test]
    fn test_copy_dir() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("media")).unwrap();
        fs::write(src.path().join("favicon.ico"), b"icon").unwrap();
        fs::write(src.path().join("media").join("404.gif"), b"gif").unwrap();

        assert_eq!(2, copy_dir(src.path(), dst.path()).unwrap());
        assert_eq!(b"gif".to_vec(), fs::read(dst.path().join("media").join("404.gif")).unwrap());
        assert!(dst.path().join("favicon.ico").is_file());
    }

    #[test]
    fn test_copy_missing_dir() {
        let dst = tempfile::tempdir().unwrap();
        assert_eq!(0, copy_dir(&dst.path().join("nope"), dst.path()).unwrap());
    }
}
