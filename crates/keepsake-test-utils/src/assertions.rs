//! Assertion helpers with readable failure output.

use std::path::Path;

/// Assert that a file's content equals `expected` exactly.
pub fn assert_file_equals(path: &Path, expected: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));

    if content != expected {
        panic!(
            "File {} content does not match expected.\n{}",
            path.display(),
            render_diff(expected, &content)
        );
    }
}

/// Assert that nothing exists at `path`.
pub fn assert_file_missing(path: &Path) {
    assert!(
        !path.exists(),
        "Expected {} to be missing, but it exists",
        path.display()
    );
}

/// Assert that two strings are equal, with a line diff on failure.
pub fn assert_strings_equal(actual: &str, expected: &str) {
    if actual != expected {
        panic!("Strings are not equal.\n{}", render_diff(expected, actual));
    }
}

fn render_diff(expected: &str, actual: &str) -> String {
    let diff = similar::TextDiff::from_lines(expected, actual);
    let mut output = String::from("Diff (-expected +actual):\n");

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            similar::ChangeTag::Delete => "-",
            similar::ChangeTag::Insert => "+",
            similar::ChangeTag::Equal => " ",
        };
        output.push_str(&format!("{}{}", sign, change));
        if change.missing_newline() {
            output.push('\n');
        }
    }

    output
}

/// Assert that a result is Err and extract the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}
