/// Biquad (2nd-order IIR) filter coefficients.
///
/// Implements the difference equation:
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
///
/// Note: a0 is assumed to be 1.0 (normalized form)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Creates 2nd-order IIR notch coefficients.
    ///
    /// The -3 dB bandwidth is `freq / q`. Frequency and sample rate only need
    /// consistent units (kHz with times in ms).
    ///
    /// Returns `None` unless `0 < freq < sample_rate / 2`.
    ///
    /// # Example
    /// ```
    /// # use axonraster::BiquadCoeffs;
    /// // 5 kHz stimulation artifact in a trace sampled every 5 us (200 kHz)
    /// let coeffs = BiquadCoeffs::notch(200.0, 5.0, 10.0).unwrap();
    /// assert!((coeffs.b0 + coeffs.b1 + coeffs.b2 - (1.0 + coeffs.a1 + coeffs.a2)).abs() < 1e-12);
    /// ```
    pub fn notch(sample_rate: f64, freq: f64, q: f64) -> Option<Self> {
        use core::f64::consts::PI;

        let w0 = 2.0 * freq / sample_rate;
        if !(w0 > 0.0 && w0 < 1.0) || !(q > 0.0) {
            return None;
        }

        let bandwidth = w0 / q * PI;
        let omega = w0 * PI;
        let beta = libm::tan(bandwidth / 2.0);
        let gain = 1.0 / (1.0 + beta);
        let cos_omega = libm::cos(omega);

        Some(Self {
            b0: gain,
            b1: -2.0 * gain * cos_omega,
            b2: gain,
            a1: -2.0 * gain * cos_omega,
            a2: 2.0 * gain - 1.0,
        })
    }
}

/// IIR filter built from cascaded biquad sections.
///
/// The number of sections is chosen at runtime since the notch stage takes
/// any number of frequencies. Running the cascade sample by sample is the
/// same as filtering the whole trace through each section in turn.
///
/// # Memory Layout
/// - `coeffs`: One biquad coefficient set per section
/// - `state`: Delay line storing [x1, x2, y1, y2] for each section
///
/// # Example
/// ```
/// # use axonraster::{IirFilter, BiquadCoeffs};
/// let mut filter = IirFilter::new(vec![BiquadCoeffs::notch(100.0, 10.0, 10.0).unwrap()]);
/// let filtered = filter.process_sample(0.5);
/// assert!(filtered.is_finite());
/// ```
#[derive(Clone, Debug)]
pub struct IirFilter {
    coeffs: Vec<BiquadCoeffs>,
    // State: [x1, x2, y1, y2] for each section
    state: Vec<[f64; 4]>,
}

impl IirFilter {
    /// Creates a new IIR filter from biquad sections, applied in order.
    pub fn new(coeffs: Vec<BiquadCoeffs>) -> Self {
        let state = vec![[0.0; 4]; coeffs.len()];
        Self { coeffs, state }
    }

    /// Processes a single sample through all cascaded sections.
    #[inline]
    pub fn process_sample(&mut self, input: f64) -> f64 {
        let mut x = input;

        for (c, s) in self.coeffs.iter().zip(self.state.iter_mut()) {
            // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
            let y = c.b0 * x + c.b1 * s[0] + c.b2 * s[1] - c.a1 * s[2] - c.a2 * s[3];

            s[1] = s[0]; // x[n-2] = x[n-1]
            s[0] = x; // x[n-1] = x[n]
            s[3] = s[2]; // y[n-2] = y[n-1]
            s[2] = y; // y[n-1] = y[n]

            x = y; // Output becomes input to next section
        }

        x
    }
}
