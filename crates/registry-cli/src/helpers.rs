//! Shared helper functions used across CLI subcommands.

use std::path::Path;

use anyhow::{Context, Result};
use registry_store::Value;
use registry_store::value::display_value;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the given default log level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Create the parent directory of `db_path` if it does not exist yet.
pub fn ensure_parent_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Render result rows as tab-separated lines.
pub fn format_rows(rows: &[Vec<Value>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(display_value)
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/deeper/registry.db");
        ensure_parent_dir(&db_path).unwrap();
        assert!(db_path.parent().unwrap().is_dir());
    }

    #[test]
    fn bare_file_name_needs_no_directory() {
        ensure_parent_dir(Path::new("registry.db")).unwrap();
    }

    #[test]
    fn rows_are_tab_separated() {
        let rows = vec![
            vec![Value::Integer(1), Value::Text("ИП".into())],
            vec![Value::Integer(2), Value::Null],
        ];
        assert_eq!(format_rows(&rows), "1\tИП\n2\tNULL");
    }
}
