//! Validation gate
//!
//! Batch-level and per-file checks that run before anything reaches the
//! network. The cardinality check refuses a whole selection; the remaining
//! checks reject individual files.

use crate::config::BatchConfig;
use crate::error::ValidationError;
use crate::types::{BatchRequest, ProcessingMode, SelectedFile};

/// Characters that may not appear in a file name
pub const ILLEGAL_CHARACTERS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Constraints applied to a selection
#[derive(Clone, Debug)]
pub struct ValidationRules {
    /// Maximum number of files per selection
    pub max_files: usize,
    /// Per-file size limit
    pub max_file_bytes: Option<u64>,
    /// Accepted media types (empty = any)
    pub allowed_media_types: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for ValidationRules {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_file_bytes: config.max_file_bytes,
            allowed_media_types: config.allowed_media_types.clone(),
        }
    }
}

/// A selected file together with its validation verdict
#[derive(Clone, Debug)]
pub struct Screened {
    /// The file as selected
    pub file: SelectedFile,
    /// Why it was rejected, if it was
    pub rejection: Option<ValidationError>,
}

/// Result of validating a selection, in selection order
#[derive(Clone, Debug, Default)]
pub struct Validated {
    /// Every selected file, accepted or not
    pub files: Vec<Screened>,
}

impl Validated {
    /// Files that passed every check
    pub fn accepted(&self) -> impl Iterator<Item = &SelectedFile> {
        self.files
            .iter()
            .filter(|s| s.rejection.is_none())
            .map(|s| &s.file)
    }

    /// Files that failed a check, with the reason
    pub fn rejected(&self) -> impl Iterator<Item = (&SelectedFile, &ValidationError)> {
        self.files
            .iter()
            .filter_map(|s| s.rejection.as_ref().map(|r| (&s.file, r)))
    }
}

/// Validate a selection
///
/// Returns [`ValidationError::TooManyFiles`] when the selection exceeds
/// `max_files`; nothing is accepted in that case. Otherwise every file is
/// screened individually.
pub fn validate(
    selection: Vec<SelectedFile>,
    rules: &ValidationRules,
) -> Result<Validated, ValidationError> {
    if selection.len() > rules.max_files {
        return Err(ValidationError::TooManyFiles {
            count: selection.len(),
            max: rules.max_files,
        });
    }

    let files = selection
        .into_iter()
        .map(|file| {
            let rejection = check_file(&file, rules).err();
            if let Some(reason) = &rejection {
                tracing::debug!(file = %file.name, reason = %reason, "file rejected");
            }
            Screened { file, rejection }
        })
        .collect();

    Ok(Validated { files })
}

/// Check a single file against the per-file rules
pub fn check_file(file: &SelectedFile, rules: &ValidationRules) -> Result<(), ValidationError> {
    check_name(&file.name)?;

    if let Some(max) = rules.max_file_bytes
        && file.payload.size > max
    {
        return Err(ValidationError::FileTooLarge {
            size: file.payload.size,
            max,
        });
    }

    if !rules.allowed_media_types.is_empty()
        && !rules
            .allowed_media_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&file.payload.media_type))
    {
        return Err(ValidationError::UnsupportedMediaType {
            media_type: file.payload.media_type.clone(),
        });
    }

    Ok(())
}

/// Check that a name is usable as a file name
///
/// Rejects empty or whitespace-only names and names containing any of
/// `< > : " / \ | ? *`. Runs at selection and on every rename.
pub fn check_name(candidate: &str) -> Result<(), ValidationError> {
    if candidate.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if let Some(character) = candidate.chars().find(|c| ILLEGAL_CHARACTERS.contains(c)) {
        return Err(ValidationError::IllegalCharacter { character });
    }

    Ok(())
}

/// Check that a batch request carries what its processing mode needs
pub fn check_request(request: &BatchRequest) -> Result<(), ValidationError> {
    if request.processing_mode == ProcessingMode::RemoteBucket {
        let destination = request
            .destination
            .as_ref()
            .ok_or(ValidationError::MissingDestination)?;
        if destination.bucket.trim().is_empty() {
            return Err(ValidationError::EmptyBucket);
        }
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Destination, ExportFormat, FilePayload};

    fn files(n: usize) -> Vec<SelectedFile> {
        (0..n)
            .map(|i| SelectedFile::new(format!("photo {}.png", i), vec![0u8; 16]))
            .collect()
    }

    #[test]
    fn six_files_refuse_the_whole_selection() {
        let result = validate(files(6), &ValidationRules::default());
        assert_eq!(
            result.unwrap_err(),
            ValidationError::TooManyFiles { count: 6, max: 5 }
        );
    }

    #[test]
    fn five_files_are_accepted_in_order() {
        let validated = validate(files(5), &ValidationRules::default()).unwrap();

        let names: Vec<&str> = validated.accepted().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["photo 0.png", "photo 1.png", "photo 2.png", "photo 3.png", "photo 4.png"]
        );
        assert_eq!(validated.rejected().count(), 0);
    }

    #[test]
    fn empty_selection_is_valid() {
        let validated = validate(Vec::new(), &ValidationRules::default()).unwrap();
        assert!(validated.files.is_empty());
    }

    #[test]
    fn check_name_rejects_empty_and_whitespace() {
        assert_eq!(check_name(""), Err(ValidationError::EmptyName));
        assert_eq!(check_name("   \t"), Err(ValidationError::EmptyName));
    }

    #[test]
    fn check_name_rejects_every_illegal_character() {
        for &c in ILLEGAL_CHARACTERS {
            let name = format!("bad{}name.png", c);
            assert_eq!(
                check_name(&name),
                Err(ValidationError::IllegalCharacter { character: c }),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn check_name_accepts_ordinary_names() {
        assert!(check_name("holiday_2024 (copy).jpg").is_ok());
        assert!(check_name("résumé.png").is_ok());
    }

    #[test]
    fn illegal_names_are_rejected_per_file() {
        let selection = vec![
            SelectedFile::new("good.png", vec![1u8]),
            SelectedFile::new("bad:name.png", vec![1u8]),
        ];

        let validated = validate(selection, &ValidationRules::default()).unwrap();

        assert_eq!(validated.accepted().count(), 1);
        let rejected: Vec<_> = validated.rejected().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0.name, "bad:name.png");
        assert_eq!(
            rejected[0].1,
            &ValidationError::IllegalCharacter { character: ':' }
        );
    }

    #[test]
    fn size_limit_is_optional() {
        let big = SelectedFile::new("big.png", vec![0u8; 2048]);
        assert!(check_file(&big, &ValidationRules::default()).is_ok());

        let rules = ValidationRules {
            max_file_bytes: Some(1024),
            ..ValidationRules::default()
        };
        assert_eq!(
            check_file(&big, &rules),
            Err(ValidationError::FileTooLarge {
                size: 2048,
                max: 1024
            })
        );
    }

    #[test]
    fn media_type_allow_list_is_case_insensitive() {
        let rules = ValidationRules {
            allowed_media_types: vec!["IMAGE/PNG".into()],
            ..ValidationRules::default()
        };
        let png = SelectedFile::new("a.png", vec![0u8]);
        let pdf = SelectedFile::with_payload("a.pdf", FilePayload::new(vec![0u8], "application/pdf"));

        assert!(check_file(&png, &rules).is_ok());
        assert!(matches!(
            check_file(&pdf, &rules),
            Err(ValidationError::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn remote_bucket_requires_destination() {
        let mut request = BatchRequest {
            processing_mode: ProcessingMode::RemoteBucket,
            export_format: ExportFormat::Png,
            destination: None,
        };
        assert_eq!(
            check_request(&request),
            Err(ValidationError::MissingDestination)
        );

        request.destination = Some(Destination::new("  ", "out/"));
        assert_eq!(check_request(&request), Err(ValidationError::EmptyBucket));

        request.destination = Some(Destination::new("media", "out/"));
        assert!(check_request(&request).is_ok());
    }

    #[test]
    fn local_mode_ignores_destination() {
        assert!(check_request(&BatchRequest::local(ExportFormat::Webp)).is_ok());
    }
}
