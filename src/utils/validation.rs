use crate::models::{ArtifactKind, FileMeta, FileUpsertBody};
use crate::services::error::{FieldError, ValidationError};
use validator::Validate;

/// Checks that an uploaded filename carries the extension of its artifact kind
pub fn validate_artifact_filename(filename: &str, kind: ArtifactKind) -> Result<(), ValidationError> {
    let suffix = format!(".{}", kind.extension());
    if filename.len() > suffix.len() && filename.ends_with(&suffix) {
        return Ok(());
    }

    Err(ValidationError::UnsupportedFile(format!(
        "At the moment, only {} files are supported",
        kind.description()
    )))
}

/// Validates contributor metadata before it is used in paths or sent upstream
pub fn validate_file_meta(meta: &FileMeta) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = meta.validate() {
        for (field, field_errors) in e.field_errors() {
            for err in field_errors {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                errors.push(FieldError::new(format!("recording.{field}"), message));
            }
        }
    }

    // The language becomes part of the published filename
    if !meta.language.is_empty()
        && !meta
            .language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        errors.push(FieldError::new(
            "recording.language",
            "language may only contain ASCII letters, digits, '-' and '_'",
        ));
    }

    if !meta.mime_type.is_empty() && meta.mime_type.parse::<mime::Mime>().is_err() {
        errors.push(FieldError::new(
            "recording.mime_type",
            format!("'{}' is not a valid MIME type", meta.mime_type),
        ));
    }

    if errors.is_empty() {
        return Ok(());
    }
    errors.sort_by(|a, b| a.field.cmp(&b.field));
    Err(ValidationError::Schema(errors))
}

/// Parses the JSON metadata part of an upload: `{"recording": {"language": .., "mime_type": ..}}`
pub fn parse_file_meta(raw: &str) -> Result<FileMeta, ValidationError> {
    let body: FileUpsertBody = serde_json::from_str(raw)
        .map_err(|e| ValidationError::Schema(vec![FieldError::new("meta", e.to_string())]))?;
    validate_file_meta(&body.recording)?;
    Ok(body.recording)
}

/// Rejects path parameters that could escape their position in a URL or path
pub fn validate_path_segment(name: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(ValidationError::Schema(vec![FieldError::new(
            name,
            format!("'{}' is not a valid {}", value, name),
        )]));
    }
    Ok(())
}

/// Validates a directory relative to the media root
pub fn validate_relative_dir(dir: &str) -> Result<(), ValidationError> {
    let trimmed = dir.trim_matches('/');
    if trimmed.is_empty() {
        return Err(ValidationError::Schema(vec![FieldError::new(
            "dir",
            "dir must name a directory below the media root",
        )]));
    }
    for segment in trimmed.split('/') {
        validate_path_segment("dir", segment)?;
    }
    Ok(())
}
