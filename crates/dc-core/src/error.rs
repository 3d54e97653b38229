use thiserror::Error;

pub type DcResult<T> = Result<T, DcError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DcError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Root not bracketed for {what}: f({lo})={f_lo}, f({hi})={f_hi}")]
    NotBracketed {
        what: &'static str,
        lo: f64,
        hi: f64,
        f_lo: f64,
        f_hi: f64,
    },
}
