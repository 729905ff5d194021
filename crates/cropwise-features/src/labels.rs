//! Crop name to class index mapping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::FeatureError;

/// Maps crop names to dense class indices in sorted name order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Collect the distinct labels, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::EmptyLabels`] when `labels` is empty.
    pub fn fit(labels: &[String]) -> Result<Self, FeatureError> {
        if labels.is_empty() {
            return Err(FeatureError::EmptyLabels);
        }
        let classes: BTreeSet<&String> = labels.iter().collect();
        Ok(Self {
            classes: classes.into_iter().cloned().collect(),
        })
    }

    /// Index of `label`.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::UnknownLabel`] for a label not seen in `fit`.
    pub fn encode(&self, label: &str) -> Result<usize, FeatureError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| FeatureError::UnknownLabel {
                label: label.to_string(),
            })
    }

    /// Encode every label.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::UnknownLabel`] on the first unseen label.
    pub fn encode_all(&self, labels: &[String]) -> Result<Vec<usize>, FeatureError> {
        labels.iter().map(|l| self.encode(l)).collect()
    }

    /// Name of class `class`.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::UnknownClass`] when `class >= n_classes()`.
    pub fn decode(&self, class: usize) -> Result<&str, FeatureError> {
        self.classes
            .get(class)
            .map(String::as_str)
            .ok_or(FeatureError::UnknownClass {
                class,
                n_classes: self.classes.len(),
            })
    }

    /// Return the class names in index order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crops(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sorted_unique_classes() {
        let encoder = LabelEncoder::fit(&crops(&["rice", "maize", "rice", "chickpea"])).unwrap();
        assert_eq!(encoder.classes(), &crops(&["chickpea", "maize", "rice"])[..]);
        assert_eq!(encoder.encode("rice").unwrap(), 2);
        assert_eq!(encoder.decode(1).unwrap(), "maize");
        assert_eq!(encoder.encode_all(&crops(&["maize", "chickpea"])).unwrap(), vec![1, 0]);
    }

    #[test]
    fn unknown_values_rejected() {
        let encoder = LabelEncoder::fit(&crops(&["rice"])).unwrap();
        assert!(matches!(encoder.encode("coffee").unwrap_err(), FeatureError::UnknownLabel { .. }));
        assert!(matches!(
            encoder.decode(3).unwrap_err(),
            FeatureError::UnknownClass { class: 3, n_classes: 1 }
        ));
        assert!(matches!(LabelEncoder::fit(&[]).unwrap_err(), FeatureError::EmptyLabels));
    }
}
