//! Element kinds a [`Matrix`](crate::Matrix) may hold.
//!
//! Only fixed-width signed integers (16/32/64 bits) and IEEE floats (32/64
//! bits) are allowed. The [`Element`] trait is sealed, so any other type is
//! rejected when the program is built:
//!
//! ```compile_fail
//! use fixed_matmul::Matrix;
//!
//! let m = Matrix::<u8, 4, 4>::zeroed();
//! ```
//!
//! ```compile_fail
//! use fixed_matmul::Element;
//!
//! #[derive(Clone, Copy)]
//! struct Fixed(i32);
//! impl Element for Fixed {}
//! ```

use std::fmt::{self, Debug};
use std::ops::{Add, Mul};

use num_traits::{One, Zero};

/// Lane width used when no hardware-specific width is known.
pub const DEFAULT_LANES: usize = 4;

/// Runtime tag for each allowed element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    /// Size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::I16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::I16 => write!(f, "i16"),
            DType::I32 => write!(f, "i32"),
            DType::I64 => write!(f, "i64"),
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A numeric type the kernels can multiply.
///
/// Sealed: implemented for `i16`, `i32`, `i64`, `f32` and `f64` only.
pub trait Element:
    sealed::Sealed
    + Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + Zero
    + One
    + Add<Output = Self>
    + Mul<Output = Self>
    + bytemuck::Pod
    + 'static
{
    const DTYPE: DType;

    /// Elements that fit in one 256-bit vector register.
    const NATURAL_LANES: usize;

    /// Converts a cell index into a value (`as` semantics: integers wrap,
    /// floats round to nearest).
    fn from_index(v: usize) -> Self;

    /// `acc + self * b` with a single rounding for floats. Only fast where
    /// the CPU has a fused multiply-add instruction.
    fn mul_add(self, b: Self, acc: Self) -> Self;

    /// `acc + self * b` as a separate multiply and add (two roundings for
    /// floats).
    fn mul_add_unfused(self, b: Self, acc: Self) -> Self;
}

macro_rules! impl_int_element {
    ($($t:ty => $dtype:ident),*) => {
        $(
            impl sealed::Sealed for $t {}

            impl Element for $t {
                const DTYPE: DType = DType::$dtype;
                const NATURAL_LANES: usize = 32 / std::mem::size_of::<$t>();

                #[inline(always)]
                fn from_index(v: usize) -> Self {
                    v as $t
                }

                // Integers wrap on overflow in every build profile
                #[inline(always)]
                fn mul_add(self, b: Self, acc: Self) -> Self {
                    acc.wrapping_add(self.wrapping_mul(b))
                }

                #[inline(always)]
                fn mul_add_unfused(self, b: Self, acc: Self) -> Self {
                    acc.wrapping_add(self.wrapping_mul(b))
                }
            }
        )*
    };
}

macro_rules! impl_float_element {
    ($($t:ty => $dtype:ident),*) => {
        $(
            impl sealed::Sealed for $t {}

            impl Element for $t {
                const DTYPE: DType = DType::$dtype;
                const NATURAL_LANES: usize = 32 / std::mem::size_of::<$t>();

                #[inline(always)]
                fn from_index(v: usize) -> Self {
                    v as $t
                }

                #[inline(always)]
                fn mul_add(self, b: Self, acc: Self) -> Self {
                    <$t>::mul_add(self, b, acc)
                }

                #[inline(always)]
                fn mul_add_unfused(self, b: Self, acc: Self) -> Self {
                    acc + self * b
                }
            }
        )*
    };
}

impl_int_element!(i16 => I16, i32 => I32, i64 => I64);
impl_float_element!(f32 => F32, f64 => F64);
