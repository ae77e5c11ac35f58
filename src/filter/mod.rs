mod iir;

pub use iir::{BiquadCoeffs, IirFilter};
