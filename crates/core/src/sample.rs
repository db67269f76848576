//! Synthetic account data for manual testing.

use std::path::Path;

use thiserror::Error;
use tracing::info;

/// Error type for sample generation.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes a CSV with a header and `accounts` rows of unique test accounts.
pub fn generate_sample_csv(path: &Path, accounts: usize) -> Result<(), SampleError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["first_name", "last_name", "email"])?;

    for i in 1..=accounts {
        let name = format!("Test_{}", i);
        let email = format!("test_email_{}@tests.com", i);
        writer.write_record([name.as_str(), name.as_str(), email.as_str()])?;
    }
    writer.flush()?;

    info!(path = %path.display(), accounts, "Sample accounts file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_sample_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sample.csv");

        generate_sample_csv(&path, 3).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "first_name,last_name,email",
                "Test_1,Test_1,test_email_1@tests.com",
                "Test_2,Test_2,test_email_2@tests.com",
                "Test_3,Test_3,test_email_3@tests.com",
            ]
        );
    }

    #[test]
    fn test_generate_empty_sample() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");

        generate_sample_csv(&path, 0).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first_name,last_name,email\n");
    }
}
