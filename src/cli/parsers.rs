//! Shared CLI helpers for reading and writing account lists.

use cachelogin::Result;
use std::io::{Read, Write};
use std::path::Path;

/// Marker for stdin/stdout in place of a path.
const STDIO: &str = "-";

/// Read all of `source`, or stdin when it is `-`.
pub fn read_input(source: &Path) -> Result<String> {
    if source.as_os_str() == STDIO {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(source)?)
}

/// Write `text` to `dest`, or stdout when it is `-`.
pub fn write_output(dest: &Path, text: &str) -> Result<()> {
    if dest.as_os_str() == STDIO {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("accounts.txt");
        write_output(&path, "alice----t\n").unwrap();
        assert_eq!(read_input(&path).unwrap(), "alice----t\n");
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let err = read_input(Path::new("/nonexistent/accounts.txt")).unwrap_err();
        assert_eq!(err.kind(), cachelogin::ErrorKind::Io);
    }
}
