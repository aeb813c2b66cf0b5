//! Single-attribute predicate filters for sequential scans.
//!
//! A filter names a fixed byte window inside every record (offset + length),
//! how to interpret it (int, float or fixed-length string) and a comparison
//! against a literal. Records too short for the window simply don't match.

use crate::access::error::{HeapError, HeapResult};
use std::cmp::Ordering;

/// The six supported comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

impl CompareOp {
    fn eval(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ne => ord != Ordering::Equal,
        }
    }
}

/// Declared type of the filtered attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int,
    Float,
    Str,
}

/// Typed comparison literal.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i32),
    Float(f32),
    Str(Vec<u8>),
}

/// Validated filter; construction is the only place scan parameters
/// are checked, so an invalid filter is unrepresentable.
#[derive(Debug, Clone)]
pub struct Predicate {
    offset: usize,
    value: FilterValue,
    op: CompareOp,
}

impl Predicate {
    /// Build a filter from raw scan parameters.
    ///
    /// Fails with `BadScanParameter` when the length is zero, doesn't match
    /// the machine width of the declared numeric type, or disagrees with the
    /// literal's length.
    pub fn new(
        offset: usize,
        length: usize,
        attr_type: AttrType,
        literal: &[u8],
        op: CompareOp,
    ) -> HeapResult<Self> {
        if length < 1 || literal.len() != length {
            return Err(HeapError::BadScanParameter);
        }

        let value = match attr_type {
            AttrType::Int => {
                if length != std::mem::size_of::<i32>() {
                    return Err(HeapError::BadScanParameter);
                }
                let mut buf = [0u8; 4];
                buf.copy_from_slice(literal);
                FilterValue::Int(i32::from_le_bytes(buf))
            }
            AttrType::Float => {
                if length != std::mem::size_of::<f32>() {
                    return Err(HeapError::BadScanParameter);
                }
                let mut buf = [0u8; 4];
                buf.copy_from_slice(literal);
                FilterValue::Float(f32::from_le_bytes(buf))
            }
            AttrType::Str => FilterValue::Str(literal.to_vec()),
        };

        Ok(Self { offset, value, op })
    }

    fn width(&self) -> usize {
        match &self.value {
            FilterValue::Int(_) => std::mem::size_of::<i32>(),
            FilterValue::Float(_) => std::mem::size_of::<f32>(),
            FilterValue::Str(s) => s.len(),
        }
    }

    /// Test one record against the filter.
    ///
    /// A record too short to contain the comparison window is a non-match,
    /// not an error.
    pub fn matches(&self, record: &[u8]) -> bool {
        let width = self.width();
        if self.offset + width > record.len() {
            return false;
        }
        let field = &record[self.offset..self.offset + width];

        let ord = match &self.value {
            FilterValue::Int(v) => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(field);
                i32::from_le_bytes(buf).cmp(v)
            }
            FilterValue::Float(v) => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(field);
                match f32::from_le_bytes(buf).partial_cmp(v) {
                    Some(ord) => ord,
                    // NaN on either side: unordered, only != holds
                    None => return self.op == CompareOp::Ne,
                }
            }
            FilterValue::Str(s) => field.cmp(s.as_slice()),
        };

        self.op.eval(ord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_pred(offset: usize, value: i32, op: CompareOp) -> Predicate {
        Predicate::new(offset, 4, AttrType::Int, &value.to_le_bytes(), op).unwrap()
    }

    #[test]
    fn test_int_operators() {
        let record = 10i32.to_le_bytes();

        assert!(int_pred(0, 11, CompareOp::Lt).matches(&record));
        assert!(!int_pred(0, 10, CompareOp::Lt).matches(&record));
        assert!(int_pred(0, 10, CompareOp::Le).matches(&record));
        assert!(int_pred(0, 10, CompareOp::Eq).matches(&record));
        assert!(!int_pred(0, 9, CompareOp::Eq).matches(&record));
        assert!(int_pred(0, 10, CompareOp::Ge).matches(&record));
        assert!(int_pred(0, 9, CompareOp::Gt).matches(&record));
        assert!(!int_pred(0, 10, CompareOp::Gt).matches(&record));
        assert!(int_pred(0, 9, CompareOp::Ne).matches(&record));
        assert!(!int_pred(0, 10, CompareOp::Ne).matches(&record));
    }

    #[test]
    fn test_negative_int_comparison() {
        let record = (-5i32).to_le_bytes();

        assert!(int_pred(0, 0, CompareOp::Lt).matches(&record));
        assert!(!int_pred(0, -10, CompareOp::Lt).matches(&record));
        assert!(int_pred(0, -5, CompareOp::Eq).matches(&record));
    }

    #[test]
    fn test_int_at_offset() {
        let mut record = vec![0xFFu8; 8];
        record[4..8].copy_from_slice(&7i32.to_le_bytes());

        assert!(int_pred(4, 7, CompareOp::Eq).matches(&record));
        assert!(!int_pred(0, 7, CompareOp::Eq).matches(&record));
    }

    #[test]
    fn test_float_comparison() {
        let record = 2.5f32.to_le_bytes();
        let pred = |v: f32, op| {
            Predicate::new(0, 4, AttrType::Float, &v.to_le_bytes(), op).unwrap()
        };

        assert!(pred(2.5, CompareOp::Eq).matches(&record));
        assert!(pred(3.0, CompareOp::Lt).matches(&record));
        assert!(pred(2.0, CompareOp::Gt).matches(&record));
    }

    #[test]
    fn test_float_nan_only_matches_ne() {
        let record = f32::NAN.to_le_bytes();
        let pred = |op| Predicate::new(0, 4, AttrType::Float, &1.0f32.to_le_bytes(), op).unwrap();

        assert!(!pred(CompareOp::Lt).matches(&record));
        assert!(!pred(CompareOp::Eq).matches(&record));
        assert!(!pred(CompareOp::Ge).matches(&record));
        assert!(pred(CompareOp::Ne).matches(&record));
    }

    #[test]
    fn test_string_comparison_is_lexicographic() {
        let record = b"delta";
        let pred = |lit: &[u8], op| {
            Predicate::new(0, lit.len(), AttrType::Str, lit, op).unwrap()
        };

        assert!(pred(b"delta", CompareOp::Eq).matches(record));
        assert!(pred(b"echoo", CompareOp::Lt).matches(record));
        assert!(pred(b"alpha", CompareOp::Gt).matches(record));
        // Prefix comparison uses only the declared window
        assert!(pred(b"del", CompareOp::Eq).matches(record));
    }

    #[test]
    fn test_short_record_never_matches() {
        let pred = int_pred(10, 0, CompareOp::Ne);
        assert!(!pred.matches(b"short"));
        assert!(!pred.matches(b""));
    }

    #[test]
    fn test_bad_parameters_rejected() {
        // zero length
        assert!(Predicate::new(0, 0, AttrType::Str, b"", CompareOp::Eq).is_err());
        // int width mismatch
        assert!(Predicate::new(0, 2, AttrType::Int, &[1, 2], CompareOp::Eq).is_err());
        // float width mismatch
        assert!(Predicate::new(0, 8, AttrType::Float, &[0; 8], CompareOp::Eq).is_err());
        // literal length disagrees with declared length
        assert!(Predicate::new(0, 4, AttrType::Str, b"abcde", CompareOp::Eq).is_err());
    }
}
