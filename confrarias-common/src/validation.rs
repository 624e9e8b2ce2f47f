//! Payload validation helpers
//!
//! A `Validator` collects every field-level message for a payload and
//! converts into `Error::Validation` only once all fields were checked, so a
//! form can display all problems at once.

use crate::error::{Error, FieldErrors, Result};

/// Accepted upload MIME types
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Maximum upload size (5 MB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require at least `min` characters after trimming
    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        if value.trim().chars().count() < min {
            self.errors.push(
                field,
                format!("Deve ter pelo menos {} caracteres.", min),
            );
        }
        self
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(value) = value {
            if value.chars().count() > max {
                self.errors
                    .push(field, format!("Não pode exceder {} caracteres.", max));
            }
        }
        self
    }

    /// Accept `None`, an empty string, or a well-formed http(s) URL
    pub fn optional_url(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            if !value.trim().is_empty() && !is_valid_url(value.trim()) {
                self.errors.push(field, "Introduz um URL válido.");
            }
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_valid_email(value) {
            self.errors.push(field, "Introduz um email válido.");
        }
        self
    }

    /// Record an arbitrary failed check
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(field, message);
        }
        self
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

pub fn is_valid_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

/// Minimal structural check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Empty strings become `None`; everything else is trimmed
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate an uploaded image blob against the accepted types and size cap
///
/// The declared content type must be accepted and agree with the magic bytes.
pub fn validate_image(content_type: &str, bytes: &[u8]) -> Result<()> {
    let declared = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if bytes.is_empty() {
        return Err(Error::validation("image", "A imagem está vazia."));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(Error::validation("image", "A imagem não pode exceder 5MB."));
    }
    if !ACCEPTED_IMAGE_TYPES.contains(&declared.as_str()) {
        return Err(Error::validation(
            "image",
            "Apenas são aceites imagens JPEG, PNG ou WebP.",
        ));
    }

    let detected = infer::get(bytes).map(|kind| kind.mime_type());
    if detected != Some(declared.as_str()) {
        return Err(Error::validation(
            "image",
            "O conteúdo da imagem não corresponde ao tipo indicado.",
        ));
    }

    Ok(())
}
