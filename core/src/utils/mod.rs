pub mod payload_loader;

use std::any::Any;
use std::fs::File;
use std::io;
use std::io::BufRead;
use std::path::Path;

/// Reads a target list: one URL per line, blanks and `#` comments skipped.
pub fn read_lines(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = io::BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            lines.push(trimmed.to_string());
        }
    }
    Ok(lines)
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_lines_skips_blanks_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http://a.test/?q=").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "# staging").unwrap();
        writeln!(file, "  http://b.test/?q=  ").unwrap();

        let lines = read_lines(file.path()).unwrap();
        assert_eq!(lines, vec!["http://a.test/?q=", "http://b.test/?q="]);
    }

    #[test]
    fn test_read_lines_missing_file() {
        assert!(read_lines("/nonexistent/targets.txt").is_err());
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom 1");
        let caught = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "static");
    }
}
