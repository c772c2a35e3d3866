//! Path sanitization for error messages crossing the sandbox boundary (§4.4, §7).

use std::path::Path;

/// Replace `temp_file`'s path and the user's home directory with opaque
/// placeholders in `message`.
///
/// Applied to every error message that crosses the sandbox boundary so
/// that stack traces and OS error strings never leak local filesystem
/// layout to the host LLM.
#[must_use]
pub fn sanitize(message: &str, temp_file: &Path) -> String {
    let mut sanitized = message.to_string();

    if let Some(temp_str) = temp_file.to_str() {
        sanitized = sanitized.replace(temp_str, "<temp-file>");
    }

    if let Some(home) = home_dir() {
        if let Some(home_str) = home.to_str() {
            sanitized = sanitized.replace(home_str, "<home>");
        }
    }

    sanitized
}

fn home_dir() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME").map(std::path::PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn replaces_temp_file_path() {
        let temp = PathBuf::from("/tmp/pml-exec-abc123.js");
        let message = "Error: cannot read /tmp/pml-exec-abc123.js: permission denied";
        let sanitized = sanitize(message, &temp);
        assert_eq!(
            sanitized,
            "Error: cannot read <temp-file>: permission denied"
        );
    }
}
