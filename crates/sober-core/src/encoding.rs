//! Face encodings
//!
//! An encoding is an opaque fixed-size vector produced by the biometric
//! backend. Two encodings of the same face are never bit-identical, so this
//! type deliberately has no `PartialEq`: identity questions go through a
//! comparator's similarity score.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{SoberError, SoberResult};

/// Number of components in a face encoding
pub const ENCODING_DIMENSIONS: usize = 128;

/// Opaque biometric vector identifying a face
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FaceEncoding(Vec<f64>);

impl FaceEncoding {
    /// Build an encoding, rejecting wrong dimensions and non-finite values
    pub fn new(values: Vec<f64>) -> SoberResult<Self> {
        if values.len() != ENCODING_DIMENSIONS {
            return Err(SoberError::InvalidEncodingDimension {
                expected: ENCODING_DIMENSIONS,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(SoberError::NonFiniteComponent { index });
        }
        Ok(FaceEncoding(values))
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f64>> for FaceEncoding {
    type Error = SoberError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        FaceEncoding::new(values)
    }
}

impl From<FaceEncoding> for Vec<f64> {
    fn from(encoding: FaceEncoding) -> Self {
        encoding.0
    }
}

impl fmt::Debug for FaceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Raw biometric vectors stay out of logs
        write!(f, "FaceEncoding({} dims)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_dimension() {
        let err = FaceEncoding::new(vec![0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            SoberError::InvalidEncodingDimension {
                expected: ENCODING_DIMENSIONS,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_rejects_nan() {
        let mut values = vec![0.1; ENCODING_DIMENSIONS];
        values[7] = f64::NAN;
        let err = FaceEncoding::new(values).unwrap_err();
        assert!(matches!(err, SoberError::NonFiniteComponent { index: 7 }));
    }

    #[test]
    fn test_debug_hides_components() {
        let encoding = FaceEncoding::new(vec![0.25; ENCODING_DIMENSIONS]).unwrap();
        assert_eq!(format!("{:?}", encoding), "FaceEncoding(128 dims)");
    }

    #[test]
    fn test_serde_validates_on_load() {
        let short = serde_json::to_string(&vec![0.0f64; 4]).unwrap();
        assert!(serde_json::from_str::<FaceEncoding>(&short).is_err());

        let encoding = FaceEncoding::new(vec![0.5; ENCODING_DIMENSIONS]).unwrap();
        let json = serde_json::to_string(&encoding).unwrap();
        let back: FaceEncoding = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_slice(), encoding.as_slice());
    }
}
