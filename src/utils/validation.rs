use crate::utils::error::{LocalDbError, Result};
use std::collections::HashSet;
use std::path::Path;
use url::{Host, Url};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Accepts only plain-HTTP `localhost` endpoints. Anything else could be a
/// real deployment.
pub fn validate_local_endpoint(endpoint: Option<&str>) -> Result<()> {
    let endpoint_str = endpoint.unwrap_or_default();
    let not_local = || LocalDbError::NotLocalEndpoint {
        endpoint: endpoint_str.to_string(),
    };

    let url = Url::parse(endpoint_str).map_err(|_| not_local())?;
    let is_localhost = matches!(url.host(), Some(Host::Domain("localhost")));
    if url.scheme() != "http" || !is_localhost {
        return Err(not_local());
    }
    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(LocalDbError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(LocalDbError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_directory_contains(field_name: &str, dir: &Path, entries: &[&str]) -> Result<()> {
    if !dir.is_dir() {
        return Err(LocalDbError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: dir.display().to_string(),
            reason: "Not a directory".to_string(),
        });
    }

    for entry in entries {
        if !dir.join(entry).exists() {
            return Err(LocalDbError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: dir.display().to_string(),
                reason: format!("Missing {}", entry),
            });
        }
    }

    Ok(())
}

pub fn validate_file_extension(field_name: &str, file: &Path, allowed_extensions: &[&str]) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    match file.extension().and_then(|ext| ext.to_str()) {
        Some(extension) if allowed_set.contains(extension) => Ok(()),
        Some(extension) => Err(LocalDbError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.display().to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        }),
        None => Err(LocalDbError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.display().to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LocalDbError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(LocalDbError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}
