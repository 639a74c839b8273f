//! The global virtual clock.
//!
//! All scheduling is expressed in *raw ticks*, the clock's own unit. The CPU loop's
//! countdown is expressed in *scaled ticks*, which are raw ticks multiplied by the
//! clock speed factor. The factor used for conversions is not the configured factor
//! but the one latched at the start of the current slice: the countdown handed to
//! the CPU loop must be folded back into raw ticks with the same factor it was
//! issued with, or a mid-slice speed change would corrupt the slice's bookkeeping.

/// The process-wide virtual clock of a [`Scheduler`](crate::Scheduler).
///
/// Tracks cumulative elapsed raw ticks and the clock speed ("overclock") factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalClock {
    ticks: i64,
    factor: f64,
    overclock_enabled: bool,
    slice_factor: f64,
    slice_factor_inv: f64,
}

impl Default for GlobalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalClock {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            factor: 1.0,
            overclock_enabled: false,
            slice_factor: 1.0,
            slice_factor_inv: 1.0,
        }
    }

    /// Raw ticks elapsed since the clock was created.
    #[inline(always)]
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Advances the clock by `raw` ticks.
    #[inline(always)]
    pub fn advance(&mut self, raw: i64) {
        self.ticks += raw;
    }

    /// Overwrites the current tick count.
    ///
    /// Administrative hook for tests and state restoration. This may move time
    /// backwards; during normal operation the clock only ever advances.
    pub fn set_ticks(&mut self, ticks: i64) {
        self.ticks = ticks;
    }

    /// The configured speed factor, whether or not overclocking is enabled.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Sets the speed factor. Takes effect when the next slice is issued.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is not a positive number.
    pub fn set_factor(&mut self, factor: f64) {
        assert!(
            factor.is_finite() && factor > 0.0,
            "clock speed factor must be positive, got {factor}"
        );
        self.factor = factor;
    }

    pub fn overclock_enabled(&self) -> bool {
        self.overclock_enabled
    }

    pub fn set_overclock_enabled(&mut self, enabled: bool) {
        self.overclock_enabled = enabled;
    }

    /// The factor that will govern the next slice: the configured factor if
    /// overclocking is enabled, `1.0` otherwise.
    pub fn effective_factor(&self) -> f64 {
        if self.overclock_enabled { self.factor } else { 1.0 }
    }

    /// The factor the current slice was issued with.
    #[inline(always)]
    pub fn slice_factor(&self) -> f64 {
        self.slice_factor
    }

    /// Latches the effective factor for the slice about to be issued.
    pub(crate) fn latch_slice_factor(&mut self) {
        self.slice_factor = self.effective_factor();
        self.slice_factor_inv = 1.0 / self.slice_factor;
    }

    /// Converts raw ticks to scaled ticks using the latched slice factor.
    #[inline(always)]
    pub fn to_scaled(&self, raw: i64) -> i64 {
        (raw as f64 * self.slice_factor) as i64
    }

    /// Converts scaled ticks back to raw ticks using the latched slice factor.
    #[inline(always)]
    pub fn to_raw(&self, scaled: i64) -> i64 {
        (scaled as f64 * self.slice_factor_inv) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identity_factor_roundtrip() {
        let clock = GlobalClock::new();
        for raw in [0, 1, 100, -100, 20_000, i64::from(i32::MAX)] {
            assert_eq!(clock.to_scaled(raw), raw);
            assert_eq!(clock.to_raw(raw), raw);
        }
    }

    #[test]
    fn factor_ignored_until_enabled() {
        let mut clock = GlobalClock::new();
        clock.set_factor(2.0);
        clock.latch_slice_factor();
        assert_eq!(clock.to_scaled(100), 100);

        clock.set_overclock_enabled(true);
        clock.latch_slice_factor();
        assert_eq!(clock.to_scaled(100), 200);
        assert_eq!(clock.to_raw(200), 100);
    }

    #[test]
    fn latch_keeps_previous_factor_until_called() {
        let mut clock = GlobalClock::new();
        clock.set_overclock_enabled(true);
        clock.set_factor(2.0);
        clock.latch_slice_factor();

        // reconfigure without latching: conversions still use the old factor
        clock.set_factor(0.5);
        assert_eq!(clock.to_scaled(100), 200);
        assert_eq!(clock.effective_factor(), 0.5);

        clock.latch_slice_factor();
        assert_eq!(clock.to_scaled(100), 50);
    }

    #[test]
    fn conversion_truncates_toward_zero() {
        let mut clock = GlobalClock::new();
        clock.set_overclock_enabled(true);
        clock.set_factor(0.1);
        clock.latch_slice_factor();
        assert_eq!(clock.to_scaled(800), 80);
        assert_eq!(clock.to_scaled(-800), -80);
        assert_eq!(clock.to_raw(-10), -100);
    }

    #[test]
    #[should_panic(expected = "must be positive")]
    fn zero_factor_is_rejected() {
        GlobalClock::new().set_factor(0.0);
    }

    proptest::proptest! {
        #[test]
        fn scaling_is_monotonic(factor in 0.01f64..100.0, a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let mut clock = GlobalClock::new();
            clock.set_overclock_enabled(true);
            clock.set_factor(factor);
            clock.latch_slice_factor();

            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(clock.to_scaled(lo) <= clock.to_scaled(hi));
            prop_assert!(clock.to_raw(lo) <= clock.to_raw(hi));
        }

        #[test]
        fn roundtrip_error_is_bounded(factor in 0.1f64..10.0, raw in 0i64..1_000_000) {
            let mut clock = GlobalClock::new();
            clock.set_overclock_enabled(true);
            clock.set_factor(factor);
            clock.latch_slice_factor();

            let back = clock.to_raw(clock.to_scaled(raw));
            let bound = (1.0 / factor).ceil() as i64 + 1;
            prop_assert!((raw - back).abs() <= bound);
        }
    }
}
