// ABOUTME: Utility functions for validation and external tool discovery
// ABOUTME: Checks job identifiers, locates the sqlite3 shell, and sanitizes names for display

use anyhow::{bail, Result};
use which::which;

/// Validate a job identifier before it is used to name output files
///
/// The identifier becomes `<job_id>.db` and `<job_id>.log` inside the output
/// directory, so it must be a single plain file-name component.
///
/// # Errors
///
/// Returns an error if the identifier is:
/// - Empty or whitespace only
/// - `.` or `..`
/// - Contains a path separator or a control character
///
/// # Examples
///
/// ```
/// # use sqlite_merge::utils::validate_job_id;
/// assert!(validate_job_id("3f2b9c1e-merge").is_ok());
/// assert!(validate_job_id("").is_err());
/// assert!(validate_job_id("../escape").is_err());
/// ```
pub fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id.trim().is_empty() {
        bail!("Job identifier cannot be empty");
    }

    if job_id == "." || job_id == ".." {
        bail!("Job identifier cannot be '{}'", job_id);
    }

    if job_id.contains('/') || job_id.contains('\\') {
        bail!(
            "Job identifier must not contain path separators.\n\
             It names the output files <job_id>.db and <job_id>.log.\n\
             Got: {}",
            sanitize_identifier(job_id)
        );
    }

    if job_id.chars().any(|c| c.is_control()) {
        bail!("Job identifier must not contain control characters");
    }

    Ok(())
}

/// Check that the SQLite command-line shell is available
///
/// `sqlite3` may be a bare program name looked up on PATH or a path to the
/// binary.
///
/// # Errors
///
/// Returns an error with installation instructions if the shell is missing.
pub fn check_required_tools(sqlite3: &str) -> Result<()> {
    if which(sqlite3).is_err() {
        bail!(
            "Missing required SQLite command-line shell: {}\n\
             \n\
             Please install the sqlite3 shell:\n\
             - Ubuntu/Debian: sudo apt-get install sqlite3\n\
             - macOS: brew install sqlite\n\
             - RHEL/CentOS: sudo yum install sqlite\n\
             - Windows: Download from https://www.sqlite.org/download.html\n\
             \n\
             Or point --sqlite3 / MERGE_SQLITE3 at an existing binary.",
            sqlite3
        );
    }

    Ok(())
}

/// Sanitize an identifier (table name, job identifier, etc.) for display
///
/// Removes control characters and limits length to prevent log injection and
/// keep error messages readable. Display only; never use the result in SQL.
///
/// # Examples
///
/// ```
/// # use sqlite_merge::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\nname"), "tablename");
/// assert_eq!(sanitize_identifier(&"a".repeat(200)).len(), 100);
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}
