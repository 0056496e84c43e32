// src/filter.rs - One-Euro adaptive low-pass filter for joint positions and depth
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneEuroSettings {
    /// Nominal sample rate (Hz), used until two timestamped samples arrive.
    pub freq: f64,
    pub min_cutoff: f64,
    pub beta: f64,
    pub d_cutoff: f64,
    pub min_beta: f64,
    pub max_beta: f64,
}

impl Default for OneEuroSettings {
    fn default() -> Self {
        Self {
            freq: 120.0,
            min_cutoff: 0.0001,
            beta: 500.0,
            d_cutoff: 1.0,
            min_beta: 25.0,
            max_beta: 250.0,
        }
    }
}

impl OneEuroSettings {
    /// Maps a 0-1 smoothing slider onto `[min_beta, max_beta]`.
    /// Smoothing 0 gives the most responsive filter.
    pub fn beta_for_smoothing(&self, smoothing: f32) -> f64 {
        let s = f64::from(smoothing.clamp(0.0, 1.0));
        (1.0 - s).abs() * (self.max_beta - self.min_beta) + self.min_beta
    }

    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.beta = self.beta_for_smoothing(smoothing);
        self
    }
}

fn alpha(freq: f64, cutoff: f64) -> f64 {
    let te = 1.0 / freq;
    let tau = 1.0 / (2.0 * PI * cutoff);
    1.0 / (1.0 + tau / te)
}

#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    settings: OneEuroSettings,
    freq: f64,
    x_hat: Option<f64>,
    dx_hat: f64,
    last_time: Option<f64>,
}

impl OneEuroFilter {
    pub fn new(settings: OneEuroSettings) -> Self {
        Self {
            settings,
            freq: settings.freq,
            x_hat: None,
            dx_hat: 0.0,
            last_time: None,
        }
    }

    pub fn settings(&self) -> &OneEuroSettings {
        &self.settings
    }

    /// Takes effect on the next sample; the filter history is kept.
    pub fn update_settings(&mut self, settings: OneEuroSettings) {
        self.settings = settings;
        if self.last_time.is_none() {
            self.freq = settings.freq;
        }
    }

    pub fn adaptive_cutoff(&self, dx_hat: f64) -> f64 {
        self.settings.min_cutoff + self.settings.beta * dx_hat.abs()
    }

    /// Filters one sample. `timestamp` is in seconds; without one the
    /// last known rate is assumed.
    pub fn filter(&mut self, x: f64, timestamp: Option<f64>) -> f64 {
        if let (Some(prev), Some(now)) = (self.last_time, timestamp) {
            let te = now - prev;
            if te > 0.0 {
                self.freq = 1.0 / te;
            }
        }
        if timestamp.is_some() {
            self.last_time = timestamp;
        }

        let Some(x_prev) = self.x_hat else {
            self.x_hat = Some(x);
            return x;
        };

        let dx = (x - x_prev) * self.freq;
        self.dx_hat += alpha(self.freq, self.settings.d_cutoff) * (dx - self.dx_hat);

        let cutoff = self.adaptive_cutoff(self.dx_hat);
        let a = alpha(self.freq, cutoff);
        let x_hat = a * x + (1.0 - a) * x_prev;
        self.x_hat = Some(x_hat);
        x_hat
    }

    pub fn last_value(&self) -> Option<f64> {
        self.x_hat
    }

    pub fn reset(&mut self) {
        self.freq = self.settings.freq;
        self.x_hat = None;
        self.dx_hat = 0.0;
        self.last_time = None;
    }
}

/// Componentwise filter for positions.
#[derive(Debug, Clone)]
pub struct OneEuroFilterVec3 {
    axes: [OneEuroFilter; 3],
}

impl OneEuroFilterVec3 {
    pub fn new(settings: OneEuroSettings) -> Self {
        Self {
            axes: [
                OneEuroFilter::new(settings),
                OneEuroFilter::new(settings),
                OneEuroFilter::new(settings),
            ],
        }
    }

    pub fn filter(&mut self, v: Vector3<f32>, timestamp: Option<f64>) -> Vector3<f32> {
        Vector3::new(
            self.axes[0].filter(f64::from(v.x), timestamp) as f32,
            self.axes[1].filter(f64::from(v.y), timestamp) as f32,
            self.axes[2].filter(f64::from(v.z), timestamp) as f32,
        )
    }

    pub fn update_settings(&mut self, settings: OneEuroSettings) {
        for axis in self.axes.iter_mut() {
            axis.update_settings(settings);
        }
    }

    pub fn reset(&mut self) {
        for axis in self.axes.iter_mut() {
            axis.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_cutoff() -> OneEuroSettings {
        OneEuroSettings {
            freq: 60.0,
            min_cutoff: 1.0,
            beta: 0.0,
            d_cutoff: 1.0,
            ..OneEuroSettings::default()
        }
    }

    #[test]
    fn first_sample_passes_through() {
        let mut filter = OneEuroFilter::new(OneEuroSettings::default());
        assert_eq!(filter.filter(0.42, None), 0.42);
    }

    #[test]
    fn smoothing_slider_remap() {
        let settings = OneEuroSettings::default();
        assert_eq!(settings.beta_for_smoothing(0.0), 250.0);
        assert_eq!(settings.beta_for_smoothing(1.0), 25.0);
        assert!((settings.beta_for_smoothing(0.5) - 137.5).abs() < 1e-9);
        assert_eq!(settings.beta_for_smoothing(7.0), 25.0);
    }

    #[test]
    fn timestamps_override_nominal_rate() {
        let mut a = OneEuroFilter::new(fixed_cutoff());
        let mut b = OneEuroFilter::new(fixed_cutoff());
        a.filter(0.0, Some(0.0));
        b.filter(0.0, Some(0.0));
        // 10 Hz actual rate lets more of the step through than 60 Hz.
        let slow = a.filter(1.0, Some(0.1));
        let fast = b.filter(1.0, Some(1.0 / 60.0));
        assert!(slow > fast);
    }

    #[test]
    fn reset_forgets_history() {
        let mut filter = OneEuroFilter::new(fixed_cutoff());
        filter.filter(10.0, None);
        filter.filter(10.0, None);
        filter.reset();
        assert_eq!(filter.filter(-3.0, None), -3.0);
    }

    #[test]
    fn vector_filter_is_componentwise() {
        let mut filter = OneEuroFilterVec3::new(fixed_cutoff());
        let first = filter.filter(Vector3::new(1.0, 2.0, 3.0), None);
        assert_eq!(first, Vector3::new(1.0, 2.0, 3.0));
        let second = filter.filter(Vector3::new(1.0, 4.0, 3.0), None);
        assert_eq!(second.x, 1.0);
        assert_eq!(second.z, 3.0);
        assert!(second.y > 2.0 && second.y < 4.0);
    }

    proptest! {
        #[test]
        fn cutoff_is_monotonic_in_speed(
            beta in 0.0f64..1000.0,
            min_cutoff in 0.0001f64..10.0,
            a in -1000.0f64..1000.0,
            b in -1000.0f64..1000.0,
        ) {
            let filter = OneEuroFilter::new(OneEuroSettings {
                beta,
                min_cutoff,
                ..OneEuroSettings::default()
            });
            let (lo, hi) = if a.abs() <= b.abs() { (a, b) } else { (b, a) };
            prop_assert!(filter.adaptive_cutoff(lo) <= filter.adaptive_cutoff(hi));
        }

        #[test]
        fn constant_signal_error_never_grows(
            start in -10.0f64..10.0,
            target in -10.0f64..10.0,
            beta in 0.0f64..500.0,
        ) {
            let mut filter = OneEuroFilter::new(OneEuroSettings { beta, ..OneEuroSettings::default() });
            filter.filter(start, None);
            let mut error = (start - target).abs();
            for _ in 0..50 {
                let next = (filter.filter(target, None) - target).abs();
                prop_assert!(next <= error + 1e-12);
                error = next;
            }
        }

        #[test]
        fn constant_signal_converges_at_min_cutoff_rate(
            start in -10.0f64..10.0,
            target in -10.0f64..10.0,
            steps in 1usize..200,
        ) {
            let settings = fixed_cutoff();
            let a = alpha(settings.freq, settings.min_cutoff);
            let mut filter = OneEuroFilter::new(settings);
            filter.filter(start, None);
            let mut last = start;
            for _ in 0..steps {
                last = filter.filter(target, None);
            }
            let bound = (1.0 - a).powi(steps as i32) * (start - target).abs();
            prop_assert!((last - target).abs() <= bound + 1e-9);
        }
    }
}
