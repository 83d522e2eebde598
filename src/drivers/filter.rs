use micromath::F32Ext;

/// Nominal wind vane base rate. Sample rates that do not divide it evenly fall back to it.
pub const BASE_SAMPLE_RATE_HZ: f32 = 10.0;
/// Lowest cutoff that keeps the downstream yaw estimate from oscillating.
pub const MIN_CUTOFF_HZ: f32 = 0.05;
/// Cutoff ceiling as a fraction of the sample rate (stay clear of Nyquist).
const MAX_CUTOFF_FRACTION: f32 = 0.45;
/// Butterworth Q for the second-order section.
const BUTTERWORTH_Q: f32 = 0.707_106_77;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterOrder {
    First,
    Second,
}

/// Applies the base-rate and cutoff substitutions to a requested filter setup.
pub fn effective_filter_rates(sample_rate_hz: f32, cutoff_hz: f32) -> (f32, f32) {
    let sample_rate = if sample_rate_hz > 0.0 && BASE_SAMPLE_RATE_HZ % sample_rate_hz == 0.0 {
        sample_rate_hz
    } else {
        BASE_SAMPLE_RATE_HZ
    };

    let cutoff = if cutoff_hz < MIN_CUTOFF_HZ || !cutoff_hz.is_finite() {
        MIN_CUTOFF_HZ
    } else {
        cutoff_hz.min(sample_rate * MAX_CUTOFF_FRACTION)
    };

    (sample_rate, cutoff)
}

/// PT1 Filter (First order low pass)
/// Frequency based alpha calculation
pub struct Pt1Filter {
    alpha: f32,
    state: f32,
    initialized: bool,
}

impl Pt1Filter {
    pub fn new(cutoff_freq: f32, sample_rate: f32) -> Self {
        let dt = 1.0 / sample_rate;
        let rc = 1.0 / (2.0 * core::f32::consts::PI * cutoff_freq);
        let alpha = dt / (rc + dt);
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            state: 0.0,
            initialized: false,
        }
    }

    pub fn filter(&mut self, input: f32) -> f32 {
        if !self.initialized {
            self.state = input;
            self.initialized = true;
        } else {
            self.state += self.alpha * (input - self.state);
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
        self.initialized = false;
    }
}

/// Biquad Filter (Second order)
/// Using Direct Form 2 Transpose
pub struct BiquadFilter {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
    initialized: bool,
}

impl BiquadFilter {
    pub fn new_lpf(cutoff_freq: f32, sample_rate: f32, q: f32) -> Self {
        let omega = 2.0 * core::f32::consts::PI * cutoff_freq / sample_rate;
        let sn = omega.sin();
        let cs = omega.cos();
        let alpha = sn / (2.0 * q);

        let b0 = (1.0 - cs) / 2.0;
        let b1 = 1.0 - cs;
        let b2 = (1.0 - cs) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cs;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
            initialized: false,
        }
    }

    pub fn filter(&mut self, input: f32) -> f32 {
        if !self.initialized {
            // Seed the delay line at DC steady state for this input.
            self.z1 = input * (1.0 - self.b0);
            self.z2 = input * (self.b2 - self.a2);
            self.initialized = true;
        }

        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;

        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
        self.initialized = false;
    }
}

pub enum LowPass {
    Pt1(Pt1Filter),
    Biquad(BiquadFilter),
}

impl LowPass {
    pub fn new(order: FilterOrder, cutoff_freq: f32, sample_rate: f32) -> Self {
        match order {
            FilterOrder::First => Self::Pt1(Pt1Filter::new(cutoff_freq, sample_rate)),
            FilterOrder::Second => {
                Self::Biquad(BiquadFilter::new_lpf(cutoff_freq, sample_rate, BUTTERWORTH_Q))
            }
        }
    }

    pub fn apply(&mut self, input: f32) -> f32 {
        match self {
            Self::Pt1(f) => f.filter(input),
            Self::Biquad(f) => f.filter(input),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Pt1(f) => f.reset(),
            Self::Biquad(f) => f.reset(),
        }
    }
}

/// One low-pass per thrust-vector axis. State is zeroed by [`reset`](Self::reset)
/// and the next sample re-seeds each axis.
pub struct ThrustVectorFilter {
    axes: [LowPass; 3],
    sample_rate_hz: f32,
    cutoff_hz: f32,
}

impl ThrustVectorFilter {
    pub fn configure(order: FilterOrder, sample_rate_hz: f32, cutoff_hz: f32) -> Self {
        let (sample_rate, cutoff) = effective_filter_rates(sample_rate_hz, cutoff_hz);
        if sample_rate != sample_rate_hz {
            warn!("vane filter: {} Hz does not divide the base rate, using {} Hz", sample_rate_hz, sample_rate);
        }
        if cutoff != cutoff_hz {
            warn!("vane filter: cutoff {} Hz replaced by {} Hz", cutoff_hz, cutoff);
        }

        Self {
            axes: [
                LowPass::new(order, cutoff, sample_rate),
                LowPass::new(order, cutoff, sample_rate),
                LowPass::new(order, cutoff, sample_rate),
            ],
            sample_rate_hz: sample_rate,
            cutoff_hz: cutoff,
        }
    }

    pub fn apply(&mut self, raw: [f32; 3]) -> [f32; 3] {
        [
            self.axes[0].apply(raw[0]),
            self.axes[1].apply(raw[1]),
            self.axes[2].apply(raw[2]),
        ]
    }

    pub fn reset(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.reset();
        }
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate_hz
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_rate_fallback() {
        assert_eq!(effective_filter_rates(1.0, 0.1).0, 1.0);
        assert_eq!(effective_filter_rates(2.0, 0.1).0, 2.0);
        assert_eq!(effective_filter_rates(5.0, 0.1).0, 5.0);
        assert_eq!(effective_filter_rates(10.0, 0.1).0, 10.0);
        assert_eq!(effective_filter_rates(3.0, 0.1).0, 10.0);
        assert_eq!(effective_filter_rates(0.0, 0.1).0, 10.0);
        assert_eq!(effective_filter_rates(-2.0, 0.1).0, 10.0);
    }

    #[test]
    fn cutoff_floor_and_ceiling() {
        assert_eq!(effective_filter_rates(10.0, 0.01).1, MIN_CUTOFF_HZ);
        assert_eq!(effective_filter_rates(10.0, f32::NAN).1, MIN_CUTOFF_HZ);
        assert_eq!(effective_filter_rates(10.0, 0.05).1, 0.05);
        assert!((effective_filter_rates(2.0, 3.0).1 - 0.9).abs() < 1e-6);
    }

    #[test]
    fn first_sample_seeds_both_orders() {
        for order in [FilterOrder::First, FilterOrder::Second] {
            let mut f = LowPass::new(order, 0.1, 10.0);
            assert!((f.apply(0.4) - 0.4).abs() < 1e-6);
            // Holding the input keeps a seeded filter at rest.
            for _ in 0..20 {
                assert!((f.apply(0.4) - 0.4).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn step_converges_to_input() {
        let mut bank = ThrustVectorFilter::configure(FilterOrder::Second, 10.0, 0.5);
        bank.apply([0.0, 0.0, -1.0]);
        let mut out = [0.0; 3];
        for _ in 0..400 {
            out = bank.apply([0.2, -0.1, -0.97]);
        }
        assert!((out[0] - 0.2).abs() < 1e-3);
        assert!((out[1] + 0.1).abs() < 1e-3);
        assert!((out[2] + 0.97).abs() < 1e-3);
    }

    #[test]
    fn low_cutoff_smooths_a_step() {
        let mut bank = ThrustVectorFilter::configure(FilterOrder::First, 10.0, 0.05);
        bank.apply([0.0; 3]);
        let out = bank.apply([1.0, 1.0, 1.0]);
        assert!(out[0] > 0.0 && out[0] < 0.1, "got {}", out[0]);
    }

    #[test]
    fn reset_reseeds_from_next_sample() {
        let mut bank = ThrustVectorFilter::configure(FilterOrder::Second, 10.0, 0.1);
        bank.apply([0.3, 0.3, -0.9]);
        bank.apply([0.5, 0.1, -0.8]);
        bank.reset();
        let out = bank.apply([-0.2, 0.4, -0.95]);
        assert!((out[0] + 0.2).abs() < 1e-6);
        assert!((out[1] - 0.4).abs() < 1e-6);
        assert!((out[2] + 0.95).abs() < 1e-6);
    }

    #[test]
    fn configure_reports_effective_rates() {
        let bank = ThrustVectorFilter::configure(FilterOrder::Second, 4.0, 0.0);
        assert_eq!(bank.sample_rate_hz(), 10.0);
        assert_eq!(bank.cutoff_hz(), MIN_CUTOFF_HZ);
    }
}
