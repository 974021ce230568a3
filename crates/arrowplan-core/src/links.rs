//! Precedence link lists.
//!
//! Links arrive from callers in one of four isomorphic shapes: legacy twin
//! arrays, a two-row matrix, a two-column matrix, or a `{src, dst}` map.
//! All four normalize into the same [`Links`] value, so downstream code
//! never sees the input shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ModelError, WbsId};

/// A normalized list of precedence links `src → dst`
/// ("src must finish before dst starts").
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    src: Vec<WbsId>,
    dst: Vec<WbsId>,
}

impl Links {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from legacy twin arrays. Fails with [`ModelError::LinksShape`]
    /// when the lengths disagree.
    pub fn from_arrays(src: &[WbsId], dst: &[WbsId]) -> Result<Self, ModelError> {
        if src.len() != dst.len() {
            return Err(ModelError::LinksShape(format!(
                "src has {} entries but dst has {}",
                src.len(),
                dst.len()
            )));
        }
        for &id in src.iter().chain(dst.iter()) {
            check_id(id)?;
        }
        Ok(Self { src: src.to_vec(), dst: dst.to_vec() })
    }

    /// Build from `(src, dst)` pairs.
    pub fn from_pairs(pairs: &[(WbsId, WbsId)]) -> Result<Self, ModelError> {
        let src: Vec<WbsId> = pairs.iter().map(|&(s, _)| s).collect();
        let dst: Vec<WbsId> = pairs.iter().map(|&(_, d)| d).collect();
        Self::from_arrays(&src, &dst)
    }

    /// Build from a dynamic value: a two-row matrix `[[src…], [dst…]]`,
    /// a two-column matrix `[[s, d], …]`, or a map `{src: […], dst: […]}`.
    ///
    /// A `2×2` array is ambiguous between the matrix forms and is read as
    /// two rows.
    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        match value {
            Value::Object(map) => {
                let src = id_row(map.get("src"), "src")?;
                let dst = id_row(map.get("dst"), "dst")?;
                Self::from_arrays(&src, &dst)
            }
            Value::Array(items) if items.is_empty() => Ok(Self::new()),
            Value::Array(items) => {
                if items.len() == 2 && items.iter().all(Value::is_array) {
                    let src = id_row(items.first(), "row 0")?;
                    let dst = id_row(items.get(1), "row 1")?;
                    return Self::from_arrays(&src, &dst);
                }
                let mut pairs = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let row = id_row(Some(item), &format!("row {i}"))?;
                    if row.len() != 2 {
                        return Err(ModelError::LinksShape(format!(
                            "row {i} has {} entries, expected 2",
                            row.len()
                        )));
                    }
                    pairs.push((row[0], row[1]));
                }
                Self::from_pairs(&pairs)
            }
            other => Err(ModelError::LinksShape(format!(
                "expected an array or a src/dst map, got {other}"
            ))),
        }
    }

    pub fn push(&mut self, src: WbsId, dst: WbsId) {
        self.src.push(src);
        self.dst.push(dst);
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WbsId, WbsId)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }
}

fn check_id(id: WbsId) -> Result<(), ModelError> {
    if id == 0 {
        return Err(ModelError::LinksShape(
            "wbs id 0 is reserved for internal dummies".into(),
        ));
    }
    Ok(())
}

fn id_row(value: Option<&Value>, what: &str) -> Result<Vec<WbsId>, ModelError> {
    let Some(Value::Array(items)) = value else {
        return Err(ModelError::LinksShape(format!("{what} is not an array")));
    };
    items
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| WbsId::try_from(n).ok())
                .ok_or_else(|| {
                    ModelError::LinksShape(format!("{what} contains a non-id value: {v}"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn four_forms_normalize_identically() {
        let twin = Links::from_arrays(&[1, 2, 3], &[4, 4, 5]).unwrap();
        let rows = Links::from_value(&json!([[1, 2, 3], [4, 4, 5]])).unwrap();
        let cols = Links::from_value(&json!([[1, 4], [2, 4], [3, 5]])).unwrap();
        let map = Links::from_value(&json!({"src": [1, 2, 3], "dst": [4, 4, 5]})).unwrap();
        assert_eq!(twin, rows);
        assert_eq!(twin, cols);
        assert_eq!(twin, map);
    }

    #[test]
    fn two_by_two_reads_as_rows() {
        let links = Links::from_value(&json!([[1, 2], [3, 4]])).unwrap();
        let pairs: Vec<_> = links.iter().collect();
        assert_eq!(pairs, vec![(1, 3), (2, 4)]);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let err = Links::from_arrays(&[1, 2], &[3]).unwrap_err();
        assert!(matches!(err, ModelError::LinksShape(_)));
    }

    #[test]
    fn ragged_columns_fail() {
        let err = Links::from_value(&json!([[1, 2], [3, 4], [5]])).unwrap_err();
        assert!(matches!(err, ModelError::LinksShape(_)));
    }

    #[test]
    fn zero_id_is_rejected() {
        let err = Links::from_arrays(&[0], &[1]).unwrap_err();
        assert!(matches!(err, ModelError::LinksShape(_)));
    }

    #[test]
    fn scalar_input_fails() {
        let err = Links::from_value(&json!(42)).unwrap_err();
        assert!(matches!(err, ModelError::LinksShape(_)));
    }
}
