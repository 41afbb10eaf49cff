//! Shaped, row-major host tensors.
//!
//! `Tensor<T>` owns a flat buffer plus its shape. `TensorValue` erases the
//! element type so heterogeneous operator inputs and outputs can travel in one
//! list.

use crate::errors::{QuantRnnError, Result};
use std::fmt;

/// Element types a tensor can hold.
pub trait Element: Copy + Default + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Short type name used in error messages.
    const NAME: &'static str;

    fn wrap(tensor: Tensor<Self>) -> TensorValue;
    fn view(value: &TensorValue) -> Option<&Tensor<Self>>;
}

macro_rules! impl_element {
    ($ty:ty, $name:literal, $variant:ident) => {
        impl Element for $ty {
            const NAME: &'static str = $name;

            fn wrap(tensor: Tensor<Self>) -> TensorValue {
                TensorValue::$variant(tensor)
            }

            fn view(value: &TensorValue) -> Option<&Tensor<Self>> {
                match value {
                    TensorValue::$variant(t) => Some(t),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f32, "f32", F32);
impl_element!(u8, "u8", U8);
impl_element!(i8, "i8", I8);
impl_element!(i32, "i32", I32);
impl_element!(i64, "i64", I64);

/// Dense tensor with row-major layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    data: Vec<T>,
    shape: Vec<usize>,
}

impl<T: Element> Tensor<T> {
    /// Build a tensor, checking that `data.len()` matches the shape's element count.
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(QuantRnnError::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            data: vec![T::default(); len],
            shape,
        }
    }

    /// Caller guarantees `data.len()` equals the shape's element count.
    pub(crate) fn from_parts(shape: Vec<usize>, data: Vec<T>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self { data, shape }
    }

    /// Rank-1 tensor over `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        let shape = vec![data.len()];
        Self { data, shape }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Error unless the tensor has exactly `expected` as its shape.
    pub fn expect_shape(&self, name: &str, expected: &[usize]) -> Result<()> {
        if self.shape != expected {
            return Err(QuantRnnError::ShapeMismatch {
                name: name.to_string(),
                expected: expected.to_vec(),
                actual: self.shape.clone(),
            });
        }
        Ok(())
    }
}

/// Type-erased tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValue {
    F32(Tensor<f32>),
    U8(Tensor<u8>),
    I8(Tensor<i8>),
    I32(Tensor<i32>),
    I64(Tensor<i64>),
}

impl TensorValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            TensorValue::F32(_) => f32::NAME,
            TensorValue::U8(_) => u8::NAME,
            TensorValue::I8(_) => i8::NAME,
            TensorValue::I32(_) => i32::NAME,
            TensorValue::I64(_) => i64::NAME,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            TensorValue::F32(t) => t.shape(),
            TensorValue::U8(t) => t.shape(),
            TensorValue::I8(t) => t.shape(),
            TensorValue::I32(t) => t.shape(),
            TensorValue::I64(t) => t.shape(),
        }
    }

    /// Size in bytes of one element.
    pub fn element_size(&self) -> usize {
        match self {
            TensorValue::F32(_) | TensorValue::I32(_) => 4,
            TensorValue::U8(_) | TensorValue::I8(_) => 1,
            TensorValue::I64(_) => 8,
        }
    }

    /// Borrow as a typed tensor; `name` is used in the error message.
    pub fn typed<T: Element>(&self, name: &str) -> Result<&Tensor<T>> {
        T::view(self).ok_or_else(|| QuantRnnError::TypeMismatch {
            name: name.to_string(),
            expected: T::NAME,
            actual: self.type_name(),
        })
    }
}

impl<T: Element> From<Tensor<T>> for TensorValue {
    fn from(tensor: Tensor<T>) -> Self {
        T::wrap(tensor)
    }
}
