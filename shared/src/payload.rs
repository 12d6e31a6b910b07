//! Dense numeric array payload.
//!
//! Layout: `[ndim: u8][dim: u32 BE; ndim][value: f64 BE; product(dims)]`.
//! The receiver only checks the shape.

use std::mem::size_of;

use derivative::Derivative;
use rand::Rng;
use thiserror::Error;
use zerocopy::{
    byteorder::{BigEndian, F64, U32},
    AsBytes, Ref,
};

/// `(1, window, dims, joints, 1)` skeleton window.
pub const DEFAULT_SHAPE: [usize; 5] = [1, 20, 3, 18, 1];

const DIM_LEN: usize = size_of::<U32<BigEndian>>();
const VALUE_LEN: usize = size_of::<F64<BigEndian>>();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload is empty")]
    Empty,
    #[error("array must have at least one dimension")]
    NoDimensions,
    #[error("header declares {ndim} dimensions but only {available} bytes follow")]
    Truncated { ndim: usize, available: usize },
    #[error("array shape overflows the addressable size")]
    ShapeOverflow,
    #[error("expected {expected} value bytes, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

#[derive(Derivative, Clone, PartialEq)]
#[derivative(Debug)]
pub struct ArrayPayload {
    shape: Vec<usize>,
    #[derivative(Debug = "ignore")]
    values: Vec<f64>,
}

impl ArrayPayload {
    /// Uniform `[0, 1)` values.
    pub fn random(shape: &[usize], rng: &mut impl Rng) -> Result<Self, PayloadError> {
        let count = element_count(shape)?;
        let values = (0..count).map(|_| rng.gen::<f64>()).collect();

        Ok(Self {
            shape: shape.to_vec(),
            values,
        })
    }

    pub fn from_parts(shape: Vec<usize>, values: Vec<f64>) -> Result<Self, PayloadError> {
        let count = element_count(&shape)?;
        if count != values.len() {
            return Err(PayloadError::LengthMismatch {
                expected: count * VALUE_LEN,
                actual: values.len() * VALUE_LEN,
            });
        }

        Ok(Self { shape, values })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let dims: Vec<U32<BigEndian>> = self.shape.iter().map(|&dim| U32::new(dim as u32)).collect();
        let values: Vec<F64<BigEndian>> = self.values.iter().map(|&value| F64::new(value)).collect();

        let mut bytes =
            Vec::with_capacity(1 + self.shape.len() * DIM_LEN + self.values.len() * VALUE_LEN);
        bytes.push(self.shape.len() as u8);
        bytes.extend_from_slice(dims.as_slice().as_bytes());
        bytes.extend_from_slice(values.as_slice().as_bytes());

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PayloadError> {
        let (&ndim, rest) = bytes.split_first().ok_or(PayloadError::Empty)?;
        let ndim = ndim as usize;

        if ndim == 0 {
            return Err(PayloadError::NoDimensions);
        }

        if rest.len() < ndim * DIM_LEN {
            return Err(PayloadError::Truncated {
                ndim,
                available: rest.len(),
            });
        }

        let (dims, body) = rest.split_at(ndim * DIM_LEN);
        let shape: Vec<usize> = Ref::<_, [U32<BigEndian>]>::new_slice_unaligned(dims)
            .ok_or(PayloadError::Truncated {
                ndim,
                available: rest.len(),
            })?
            .iter()
            .map(|dim| dim.get() as usize)
            .collect();

        let expected = element_count(&shape)?
            .checked_mul(VALUE_LEN)
            .ok_or(PayloadError::ShapeOverflow)?;

        if body.len() != expected {
            return Err(PayloadError::LengthMismatch {
                expected,
                actual: body.len(),
            });
        }

        let values = Ref::<_, [F64<BigEndian>]>::new_slice_unaligned(body)
            .ok_or(PayloadError::LengthMismatch {
                expected,
                actual: body.len(),
            })?
            .iter()
            .map(|value| value.get())
            .collect();

        Ok(Self { shape, values })
    }
}

fn element_count(shape: &[usize]) -> Result<usize, PayloadError> {
    if shape.is_empty() {
        return Err(PayloadError::NoDimensions);
    }

    if shape.len() > u8::MAX as usize || shape.iter().any(|&dim| dim > u32::MAX as usize) {
        return Err(PayloadError::ShapeOverflow);
    }

    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or(PayloadError::ShapeOverflow)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn default_shape_serializes_to_expected_size() {
        let mut rng = StdRng::seed_from_u64(7);
        let array = ArrayPayload::random(&DEFAULT_SHAPE, &mut rng).unwrap();

        assert_eq!(array.values().len(), 1080);
        assert_eq!(array.to_bytes().len(), 1 + 5 * 4 + 1080 * 8);
        assert!(array.values().iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn bytes_decode_back_to_same_array() {
        let array = ArrayPayload::from_parts(vec![2, 3], vec![0.5, 1.0, -2.0, 3.25, 0.0, 9.0]).unwrap();
        let decoded = ArrayPayload::from_bytes(&array.to_bytes()).unwrap();
        assert_eq!(decoded, array);
    }

    #[test]
    fn values_are_big_endian_on_the_wire() {
        let bytes = ArrayPayload::from_parts(vec![2], vec![1.0, -0.5]).unwrap().to_bytes();

        assert_eq!(&bytes[..5], &[1, 0, 0, 0, 2]);
        assert_eq!(&bytes[5..13], &1.0f64.to_be_bytes());
        assert_eq!(&bytes[13..], &(-0.5f64).to_be_bytes());
    }

    #[test]
    fn rejects_opaque_bytes() {
        assert_eq!(ArrayPayload::from_bytes(&[]), Err(PayloadError::Empty));
        assert_eq!(ArrayPayload::from_bytes(&[0]), Err(PayloadError::NoDimensions));
        assert_eq!(
            ArrayPayload::from_bytes(b"hello"),
            Err(PayloadError::Truncated {
                ndim: b'h' as usize,
                available: 4
            })
        );
    }

    #[test]
    fn rejects_body_of_wrong_length() {
        let mut bytes = ArrayPayload::from_parts(vec![2], vec![1.0, 2.0]).unwrap().to_bytes();
        bytes.pop();

        assert_eq!(
            ArrayPayload::from_bytes(&bytes),
            Err(PayloadError::LengthMismatch {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn zero_sized_dimension_is_an_empty_array() {
        let array = ArrayPayload::from_parts(vec![4, 0], vec![]).unwrap();
        let decoded = ArrayPayload::from_bytes(&array.to_bytes()).unwrap();
        assert_eq!(decoded.shape(), &[4, 0]);
        assert!(decoded.values().is_empty());
    }
}
