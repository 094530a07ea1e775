//! Fill diagnostics
//!
//! Computed per generation request and never persisted. The missing
//! lists are the primary signal that a template revision has drifted
//! from the mapping table.

use serde::Serialize;

/// How many missing identifiers to surface in headers/JSON.
pub const MISSING_SAMPLE_LIMIT: usize = 25;

#[derive(Debug, Clone, Default, Serialize)]
pub struct FillReport {
    /// Text widgets successfully written.
    pub filled_text: usize,
    /// Checkbox widgets successfully set (checked or unchecked).
    pub filled_checkbox: usize,
    /// Logical field keys with no text widget and no checkbox mapping.
    pub missing_text_in_pdf: Vec<String>,
    /// Mapped checkbox widget names absent from the template.
    pub missing_checkbox_in_pdf: Vec<String>,
}

impl FillReport {
    /// Bounded sample of missing text field keys for diagnostics.
    pub fn missing_text_sample(&self) -> &[String] {
        let n = self.missing_text_in_pdf.len().min(MISSING_SAMPLE_LIMIT);
        &self.missing_text_in_pdf[..n]
    }

    /// Bounded sample of missing checkbox widget names.
    pub fn missing_checkbox_sample(&self) -> &[String] {
        let n = self.missing_checkbox_in_pdf.len().min(MISSING_SAMPLE_LIMIT);
        &self.missing_checkbox_in_pdf[..n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_bounded() {
        let report = FillReport {
            missing_checkbox_in_pdf: (0..40).map(|i| format!("cb_{i}")).collect(),
            ..Default::default()
        };
        assert_eq!(report.missing_checkbox_sample().len(), MISSING_SAMPLE_LIMIT);
        assert_eq!(report.missing_checkbox_in_pdf.len(), 40);
    }
}
