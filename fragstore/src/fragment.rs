//! Fragments: one series' elements for one fragment group.
//!
//! A [`Fragment`] owns a fixed-length vector with one element per hour of its
//! group's month. Callers mutate the vector freely in memory and then call
//! [`Fragment::save`], which recomputes the cached total and writes the
//! whole row. Nothing is ever saved partially.
//!
//! # Element types
//!
//! The element type is chosen when a fragment is created and is stored with
//! the row as a one-character tag:
//!
//! | [`Dtype`] | Tag | Width |
//! |-----------|-----|-------|
//! | `F32`     | `f` | 4     |
//! | `F64`     | `d` | 8     |
//! | `I32`     | `i` | 4     |
//! | `I64`     | `q` | 8     |
//!
//! Element bytes are little-endian.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::{FragmentError, Result};
use crate::group::FragmentGroup;
use crate::store::StoredRow;

/// Numeric element type of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dtype {
    /// 32-bit float.
    #[default]
    F32,
    /// 64-bit float.
    F64,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
}

impl Dtype {
    /// Returns the tag stored alongside each row.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::F32 => "f",
            Self::F64 => "d",
            Self::I32 => "i",
            Self::I64 => "q",
        }
    }

    /// Returns the encoded width of one element in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::F32 | Self::I32 => 4,
            Self::F64 | Self::I64 => 8,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Dtype {
    type Err = FragmentError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "f" => Ok(Self::F32),
            "d" => Ok(Self::F64),
            "i" => Ok(Self::I32),
            "q" => Ok(Self::I64),
            other => Err(FragmentError::UnknownDtype {
                tag: other.to_string(),
            }),
        }
    }
}

/// Where the in-memory data of a fragment came from.
///
/// Only `New` affects persistence (it makes `save` insert rather than
/// update); the rest is diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentSource {
    /// Created from scratch, never saved.
    New,
    /// Loaded from a dense stored row, or saved at least once.
    Uncompressed,
    /// Loaded from a compressed row and expanded to full length.
    ///
    /// No compressed row format is defined yet; this variant and the
    /// `fragment_total_zmax` metadata key reserve the slot for one.
    Compressed,
}

impl FragmentSource {
    /// Returns the one-letter code used in diagnostic output.
    pub const fn code(self) -> char {
        match self {
            Self::New => 'N',
            Self::Uncompressed => 'U',
            Self::Compressed => 'Z',
        }
    }
}

/// Typed element vector of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentData {
    /// 32-bit float elements.
    F32(Vec<f32>),
    /// 64-bit float elements.
    F64(Vec<f64>),
    /// 32-bit integer elements.
    I32(Vec<i32>),
    /// 64-bit integer elements.
    I64(Vec<i64>),
}

impl FragmentData {
    /// Creates `len` zero elements of type `dtype`.
    pub fn zeros(dtype: Dtype, len: usize) -> Self {
        match dtype {
            Dtype::F32 => Self::F32(vec![0.0; len]),
            Dtype::F64 => Self::F64(vec![0.0; len]),
            Dtype::I32 => Self::I32(vec![0; len]),
            Dtype::I64 => Self::I64(vec![0; len]),
        }
    }

    /// Returns the element type.
    pub fn dtype(&self) -> Dtype {
        match self {
            Self::F32(_) => Dtype::F32,
            Self::F64(_) => Dtype::F64,
            Self::I32(_) => Dtype::I32,
            Self::I64(_) => Dtype::I64,
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
        }
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns element `index` widened to f64.
    #[allow(clippy::cast_precision_loss)] // i64 elements beyond 2^53 lose precision in display only
    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            Self::F32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::F64(v) => v.get(index).copied(),
            Self::I32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::I64(v) => v.get(index).map(|&x| x as f64),
        }
    }

    /// Sets element `index`, converting `value` to the element type.
    ///
    /// Integer types truncate toward zero and saturate at their bounds.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::IndexOutOfBounds`] if `index >= len()`.
    #[allow(clippy::cast_possible_truncation)] // conversion to the declared dtype is the point
    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let length = self.len();
        let oob = || FragmentError::IndexOutOfBounds { index, length };
        match self {
            Self::F32(v) => *v.get_mut(index).ok_or_else(oob)? = value as f32,
            Self::F64(v) => *v.get_mut(index).ok_or_else(oob)? = value,
            Self::I32(v) => *v.get_mut(index).ok_or_else(oob)? = value as i32,
            Self::I64(v) => *v.get_mut(index).ok_or_else(oob)? = value as i64,
        }
        Ok(())
    }

    /// Sums all elements.
    ///
    /// Floats accumulate in f64 and integers in i128, so the element type
    /// never limits the accumulator; only the final scalar is narrowed to the
    /// f64 stored in the row.
    #[allow(clippy::cast_precision_loss)] // totals beyond 2^53 are stored approximately
    pub fn sum(&self) -> f64 {
        match self {
            Self::F32(v) => v.iter().map(|&x| f64::from(x)).sum(),
            Self::F64(v) => v.iter().sum(),
            Self::I32(v) => v.iter().map(|&x| i128::from(x)).sum::<i128>() as f64,
            Self::I64(v) => v.iter().map(|&x| i128::from(x)).sum::<i128>() as f64,
        }
    }

    /// Returns `(index, value)` for every non-zero element.
    pub fn nonzero(&self) -> Vec<(usize, f64)> {
        (0..self.len())
            .filter_map(|i| self.get(i).filter(|&v| v != 0.0).map(|v| (i, v)))
            .collect()
    }

    /// Encodes the elements as little-endian bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.len() * self.dtype().width()];
        match self {
            Self::F32(v) => LittleEndian::write_f32_into(v, &mut out),
            Self::F64(v) => LittleEndian::write_f64_into(v, &mut out),
            Self::I32(v) => LittleEndian::write_i32_into(v, &mut out),
            Self::I64(v) => LittleEndian::write_i64_into(v, &mut out),
        }
        out
    }

    /// Decodes little-endian `bytes` as elements of `dtype`.
    ///
    /// Returns `None` if the byte count is not a whole number of elements.
    pub fn decode(dtype: Dtype, bytes: &[u8]) -> Option<Self> {
        if bytes.len() % dtype.width() != 0 {
            return None;
        }
        let len = bytes.len() / dtype.width();
        let mut data = Self::zeros(dtype, len);
        match &mut data {
            Self::F32(v) => LittleEndian::read_f32_into(bytes, v),
            Self::F64(v) => LittleEndian::read_f64_into(bytes, v),
            Self::I32(v) => LittleEndian::read_i32_into(bytes, v),
            Self::I64(v) => LittleEndian::read_i64_into(bytes, v),
        }
        Some(data)
    }

    /// Returns the elements as f32 if that is the element type.
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the elements as f64 if that is the element type.
    pub fn as_f64_mut(&mut self) -> Option<&mut [f64]> {
        match self {
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the elements as i32 if that is the element type.
    pub fn as_i32_mut(&mut self) -> Option<&mut [i32]> {
        match self {
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the elements as i64 if that is the element type.
    pub fn as_i64_mut(&mut self) -> Option<&mut [i64]> {
        match self {
            Self::I64(v) => Some(v),
            _ => None,
        }
    }
}

/// One series' data for one fragment group.
///
/// A fragment borrows the group it belongs to, so the group cannot be closed
/// while any of its fragments are alive.
#[derive(Debug)]
pub struct Fragment<'g> {
    group: &'g FragmentGroup,
    namespace: String,
    name: String,
    data: FragmentData,
    source: FragmentSource,
    /// Sum of `data` as of the last load or save; not updated by mutation.
    total: f64,
}

impl<'g> Fragment<'g> {
    pub(crate) fn new(
        group: &'g FragmentGroup,
        namespace: &str,
        name: &str,
        data: FragmentData,
        source: FragmentSource,
        total: f64,
    ) -> Self {
        Self {
            group,
            namespace: namespace.to_string(),
            name: name.to_string(),
            data,
            source,
            total,
        }
    }

    /// Returns the series namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the series name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns where the in-memory data came from.
    pub fn source(&self) -> FragmentSource {
        self.source
    }

    /// Returns the cached total from the last load or save.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Returns the element type.
    pub fn dtype(&self) -> Dtype {
        self.data.dtype()
    }

    /// Returns the number of elements (hours in the group's month).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the fragment has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the element vector.
    pub fn data(&self) -> &FragmentData {
        &self.data
    }

    /// Returns the f32 elements for in-place mutation, if that is the dtype.
    ///
    /// Slices keep the length fixed; only element values can change.
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        self.data.as_f32_mut()
    }

    /// Returns the f64 elements for in-place mutation, if that is the dtype.
    pub fn as_f64_mut(&mut self) -> Option<&mut [f64]> {
        self.data.as_f64_mut()
    }

    /// Returns the i32 elements for in-place mutation, if that is the dtype.
    pub fn as_i32_mut(&mut self) -> Option<&mut [i32]> {
        self.data.as_i32_mut()
    }

    /// Returns the i64 elements for in-place mutation, if that is the dtype.
    pub fn as_i64_mut(&mut self) -> Option<&mut [i64]> {
        self.data.as_i64_mut()
    }

    /// Returns element `index` widened to f64.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.data.get(index)
    }

    /// Sets element `index`.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::IndexOutOfBounds`] if `index >= len()`.
    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        self.data.set(index, value)
    }

    /// Returns the shard this fragment routes to.
    pub fn shard(&self) -> u32 {
        self.group.shard(&self.namespace, &self.name)
    }

    /// Returns true if the cached total is at or below the group's
    /// zero-density threshold.
    pub fn is_compressible(&self) -> bool {
        self.total <= self.group.metadata().fragment_total_zmax
    }

    /// Recomputes the total and writes the row.
    ///
    /// A `New` fragment is inserted; anything else updates the existing row.
    /// On success the source becomes [`FragmentSource::Uncompressed`], so a
    /// second save updates. On failure the stored row, the source and the
    /// cached total are unchanged.
    ///
    /// # Errors
    ///
    /// - [`FragmentError::DuplicateKey`] if a `New` fragment's identity is
    ///   already stored
    /// - [`FragmentError::NotFound`] if an update matched no row
    /// - [`crate::error::GroupError::ReadOnly`] or
    ///   [`crate::error::GroupError::InvalidState`] if the group does not
    ///   accept writes
    pub fn save(&mut self) -> Result<()> {
        let total = self.data.sum();
        let row = StoredRow {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            dtype: self.dtype().tag().to_string(),
            total,
            data: self.data.encode(),
        };

        let insert = self.source == FragmentSource::New;
        let shard = self.group.write_row(&row, insert)?;
        debug!(
            namespace = %self.namespace,
            name = %self.name,
            shard,
            insert,
            total,
            "saved fragment"
        );

        self.total = total;
        self.source = FragmentSource::Uncompressed;
        Ok(())
    }
}

impl fmt::Display for Fragment<'_> {
    /// Diagnostic form, e.g. `aboth/abov11 U 33.0 [(0, 11.0), (2, 22.0)]`.
    ///
    /// Lists every non-zero element, so output is long for dense fragments.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} {:?} [",
            self.namespace,
            self.name,
            self.source.code(),
            self.total
        )?;
        for (n, (i, v)) in self.data.nonzero().into_iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "({i}, {v:?})")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_tags() {
        for dtype in [Dtype::F32, Dtype::F64, Dtype::I32, Dtype::I64] {
            assert_eq!(dtype.tag().parse::<Dtype>().unwrap(), dtype);
        }
        assert_eq!(Dtype::default(), Dtype::F32);
        assert!(matches!(
            "x".parse::<Dtype>(),
            Err(FragmentError::UnknownDtype { .. })
        ));
    }

    #[test]
    fn test_zeros_and_set() {
        let mut data = FragmentData::zeros(Dtype::F32, 744);
        assert_eq!(data.len(), 744);
        assert!(data.nonzero().is_empty());

        data.set(0, 11.0).unwrap();
        data.set(2, 22.0).unwrap();
        assert_eq!(data.nonzero(), vec![(0, 11.0), (2, 22.0)]);
        assert_eq!(data.sum(), 33.0);

        assert!(matches!(
            data.set(744, 1.0),
            Err(crate::error::FragstoreError::Fragment(
                FragmentError::IndexOutOfBounds {
                    index: 744,
                    length: 744
                }
            ))
        ));
    }

    #[test]
    fn test_sum_f32_accumulates_wide() {
        // 0.1f32 summed in f32 drifts visibly over many elements.
        let data = FragmentData::F32(vec![0.1; 100_000]);
        let expected = f64::from(0.1f32) * 100_000.0;
        assert!((data.sum() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_sum_integers_do_not_overflow() {
        let data = FragmentData::I32(vec![i32::MAX; 4]);
        assert_eq!(data.sum(), 4.0 * f64::from(i32::MAX));
    }

    #[test]
    fn test_encode_decode_each_dtype() {
        let cases = [
            FragmentData::F32(vec![0.0, 1.5, -2.25]),
            FragmentData::F64(vec![0.0, 1e300, -3.5]),
            FragmentData::I32(vec![0, -7, i32::MAX]),
            FragmentData::I64(vec![0, i64::MIN, 42]),
        ];
        for data in cases {
            let bytes = data.encode();
            assert_eq!(bytes.len(), data.len() * data.dtype().width());
            assert_eq!(FragmentData::decode(data.dtype(), &bytes), Some(data));
        }
    }

    #[test]
    fn test_decode_rejects_partial_element() {
        assert_eq!(FragmentData::decode(Dtype::F64, &[0u8; 12]), None);
    }

    #[test]
    fn test_f32_little_endian_layout() {
        let bytes = FragmentData::F32(vec![1.0]).encode();
        assert_eq!(bytes, 1.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_integer_set_truncates() {
        let mut data = FragmentData::zeros(Dtype::I64, 2);
        data.set(1, 7.9).unwrap();
        assert_eq!(data.as_i64_mut().unwrap(), &[0, 7]);
        assert!(data.as_f32_mut().is_none());
    }

    #[test]
    fn test_source_codes() {
        assert_eq!(FragmentSource::New.code(), 'N');
        assert_eq!(FragmentSource::Uncompressed.code(), 'U');
        assert_eq!(FragmentSource::Compressed.code(), 'Z');
    }
}
