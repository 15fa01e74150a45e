//! Pitch editor input/output documents.
//!
//! Input is `{ "mel": [[..]], "pitches": { name: [..] } }` where `mel` is
//! rows (frequency bands, low first) by columns (time steps) and every
//! contour has one entry per column. A `"final"` contour is required. Null
//! contour entries are read as unvoiced (`0.0`).
//!
//! Output is the `"final"` contour as a bare JSON array.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PitchError, Result};

/// Name of the editable, persisted contour.
pub const FINAL_CONTOUR: &str = "final";

/// Document as it arrives on the wire, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PitchDocument {
    pub mel: Option<Vec<Vec<f64>>>,
    pub pitches: Option<BTreeMap<String, Vec<Option<f64>>>>,
}

impl PitchDocument {
    pub fn from_json_str(text: &str) -> Result<LoadedDocument> {
        let raw: PitchDocument = serde_json::from_str(text)
            .map_err(|e| PitchError::InvalidDocument(format!("not valid JSON: {e}")))?;
        raw.validate()
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<LoadedDocument> {
        let raw: PitchDocument = serde_json::from_slice(bytes)
            .map_err(|e| PitchError::InvalidDocument(format!("not valid JSON: {e}")))?;
        raw.validate()
    }

    /// Check shape and required entries. Nothing is rendered from a document
    /// that fails here.
    pub fn validate(self) -> Result<LoadedDocument> {
        let rows = self
            .mel
            .ok_or_else(|| PitchError::InvalidDocument("missing 'mel'".to_string()))?;
        let pitches = self
            .pitches
            .ok_or_else(|| PitchError::InvalidDocument("missing 'pitches'".to_string()))?;

        let matrix = MagnitudeMatrix::from_rows(rows)?;

        if !pitches.contains_key(FINAL_CONTOUR) {
            return Err(PitchError::InvalidDocument(format!(
                "'pitches' has no '{FINAL_CONTOUR}' contour"
            )));
        }

        let mut contours = BTreeMap::new();
        for (name, values) in pitches {
            if values.len() != matrix.cols() {
                return Err(PitchError::InvalidDocument(format!(
                    "contour '{}' has {} entries, expected {} (one per mel column)",
                    name,
                    values.len(),
                    matrix.cols()
                )));
            }
            contours.insert(name, values.into_iter().map(|v| v.unwrap_or(0.0)).collect());
        }

        Ok(LoadedDocument {
            matrix,
            contours: Contours { inner: contours },
        })
    }
}

/// Rectangular magnitude matrix, `[band, time]`, low band first.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeMatrix {
    values: Array2<f64>,
}

impl MagnitudeMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        if n_rows == 0 || n_cols == 0 {
            return Err(PitchError::InvalidDocument("'mel' is empty".to_string()));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(PitchError::InvalidDocument(format!(
                "'mel' is ragged: row {} has {} columns, expected {}",
                i,
                row.len(),
                n_cols
            )));
        }

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((n_rows, n_cols), flat)
            .map_err(|e| PitchError::InvalidDocument(format!("'mel' shape error: {e}")))?;
        Ok(Self { values })
    }

    /// Number of frequency bands.
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of time steps.
    pub fn cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Global (not per-row) minimum and maximum.
    pub fn min_max(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// Named contours, always containing [`FINAL_CONTOUR`].
#[derive(Debug, Clone, PartialEq)]
pub struct Contours {
    inner: BTreeMap<String, Vec<f64>>,
}

impl Contours {
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.inner.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn final_contour(&self) -> &[f64] {
        self.get(FINAL_CONTOUR).unwrap_or(&[])
    }

    pub fn final_contour_mut(&mut self) -> Option<&mut Vec<f64>> {
        self.inner.get_mut(FINAL_CONTOUR)
    }

    /// Every contour except `"final"`, in name order.
    pub fn candidates(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.inner
            .iter()
            .filter(|(name, _)| name.as_str() != FINAL_CONTOUR)
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Copy `source[range]` over `final[range]`, same length. `range` must be
    /// within bounds.
    pub(crate) fn splice_into_final(&mut self, source: &str, range: std::ops::Range<usize>) -> Result<()> {
        let src: Vec<f64> = self
            .inner
            .get(source)
            .ok_or_else(|| PitchError::UnknownContour(source.to_string()))?[range.clone()]
            .to_vec();
        let dst = self
            .inner
            .get_mut(FINAL_CONTOUR)
            .ok_or_else(|| PitchError::UnknownContour(FINAL_CONTOUR.to_string()))?;
        dst.splice(range, src);
        Ok(())
    }
}

/// A validated document: matrix plus contours of matching length.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub matrix: MagnitudeMatrix,
    pub contours: Contours,
}

impl LoadedDocument {
    /// Output document: the `"final"` contour as a JSON array.
    pub fn final_json(&self) -> String {
        // A plain Vec<f64> always serializes.
        serde_json::to_string(self.contours.final_contour()).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_document() {
        let doc = PitchDocument::from_json_str(
            r#"{"mel": [[0, 1, 2], [3, 4, 5]], "pitches": {"final": [100, null, 300], "crepe": [1, 2, 3]}}"#,
        )
        .unwrap();
        assert_eq!(doc.matrix.rows(), 2);
        assert_eq!(doc.matrix.cols(), 3);
        assert_eq!(doc.contours.final_contour(), &[100.0, 0.0, 300.0]);
        let names: Vec<&str> = doc.contours.candidates().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["crepe"]);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = PitchDocument::from_json_str(r#"{"pitches": {"final": []}}"#).unwrap_err();
        assert!(err.to_string().contains("missing 'mel'"));

        let err = PitchDocument::from_json_str(r#"{"mel": [[1]]}"#).unwrap_err();
        assert!(err.to_string().contains("missing 'pitches'"));
    }

    #[test]
    fn test_missing_final_rejected() {
        let err = PitchDocument::from_json_str(r#"{"mel": [[1]], "pitches": {"other": [1]}}"#).unwrap_err();
        assert!(err.to_string().contains("'final'"));
    }

    #[test]
    fn test_ragged_and_empty_matrix_rejected() {
        let err = PitchDocument::from_json_str(r#"{"mel": [[1, 2], [3]], "pitches": {"final": [1, 2]}}"#).unwrap_err();
        assert!(err.to_string().contains("ragged"));

        let err = PitchDocument::from_json_str(r#"{"mel": [], "pitches": {"final": []}}"#).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_contour_length_mismatch_rejected() {
        let err = PitchDocument::from_json_str(r#"{"mel": [[1, 2]], "pitches": {"final": [1, 2], "x": [1]}}"#)
            .unwrap_err();
        assert!(matches!(err, PitchError::InvalidDocument(ref m) if m.contains("'x'")));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = PitchDocument::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, PitchError::InvalidDocument(_)));
    }

    #[test]
    fn test_global_min_max() {
        let m = MagnitudeMatrix::from_rows(vec![vec![3.0, -1.0], vec![7.5, 2.0]]).unwrap();
        assert_eq!(m.min_max(), (-1.0, 7.5));
        assert_eq!(m.values()[[1, 0]], 7.5);
    }

    #[test]
    fn test_final_json_export() {
        let doc = PitchDocument::from_json_str(r#"{"mel": [[0, 1]], "pitches": {"final": [220.5, 0]}}"#).unwrap();
        assert_eq!(doc.final_json(), "[220.5,0.0]");
    }
}
