//! Cell initializers for [`Matrix::from_fn`](super::Matrix::from_fn).
//!
//! Each strategy is a pure `(row, col) -> T` mapping with no state.

use crate::element::Element;

/// Every cell is `v`.
pub fn constant<T: Element>(v: T) -> impl Fn(usize, usize) -> T + Copy {
    move |_, _| v
}

/// `v` on the main diagonal, zero elsewhere.
pub fn diagonal<T: Element>(v: T) -> impl Fn(usize, usize) -> T + Copy {
    move |row, col| if row == col { v } else { T::zero() }
}

/// The identity matrix (for square shapes).
pub fn identity<T: Element>() -> impl Fn(usize, usize) -> T + Copy {
    diagonal(T::one())
}

/// `stride * row + col + 1`: counts up from 1 in row-major order when
/// `stride` equals the column count.
///
/// ```
/// use fixed_matmul::fill::ascending;
///
/// let f = ascending::<f32>(4);
/// assert_eq!(f(0, 0), 1.0);
/// assert_eq!(f(0, 3), 4.0);
/// assert_eq!(f(1, 0), 5.0);
/// ```
pub fn ascending<T: Element>(stride: usize) -> impl Fn(usize, usize) -> T + Copy {
    move |row, col| T::from_index(stride * row + col + 1)
}
