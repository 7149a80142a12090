use crate::element::DType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatmulError {
    #[error("failed to allocate {rows}x{cols} {dtype} matrix")]
    Allocation {
        rows: usize,
        cols: usize,
        dtype: DType,
    },
    #[error("invalid repetition count {value:?}: expected a non-negative integer")]
    InvalidRepetitions { value: String },
}

pub type Result<T> = std::result::Result<T, MatmulError>;
