use chrono::{Local, NaiveDateTime, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::measurement::Measurement;

/// kWh per interval.
pub const BASE_LOAD_RANGE: (f64, f64) = (0.3, 0.8);
pub const FLUCTUATION_RANGE: (f64, f64) = (-0.05, 0.05);
pub const DECIMAL_PLACES: i32 = 4;

/// Time-of-day load profile. Hours are bucketed closed-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourBucket {
    Night,
    Morning,
    Day,
    Evening,
}

impl HourBucket {
    pub fn from_hour(hour: u32) -> HourBucket {
        match hour {
            0..6 => HourBucket::Night,
            6..9 => HourBucket::Morning,
            9..17 => HourBucket::Day,
            _ => HourBucket::Evening,
        }
    }

    /// Multiplier range applied to the base load.
    pub fn factor_range(self) -> (f64, f64) {
        match self {
            HourBucket::Night => (0.5, 0.7),
            HourBucket::Morning => (0.8, 1.1),
            HourBucket::Day => (0.7, 0.9),
            HourBucket::Evening => (1.0, 1.4),
        }
    }
}

pub trait UniformSource {
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

impl<R: Rng + ?Sized> UniformSource for R {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.gen_range(low..=high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadModel {
    base_load: f64,
}

impl LoadModel {
    pub fn new(base_load: f64) -> LoadModel {
        LoadModel { base_load }
    }

    pub fn base_load(&self) -> f64 {
        self.base_load
    }

    /// Draws a factor for `hour`, then a fluctuation, in that order.
    pub fn generate<S: UniformSource + ?Sized>(&self, hour: u32, source: &mut S) -> f64 {
        let (low, high) = HourBucket::from_hour(hour).factor_range();
        let factor = source.uniform(low, high);
        let fluctuation = source.uniform(FLUCTUATION_RANGE.0, FLUCTUATION_RANGE.1);

        let value = self.base_load * factor + fluctuation;
        if value <= 0.0 {
            return 0.0;
        }
        round_to(value, DECIMAL_PLACES)
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// A simulated meter. Its base load is drawn once and its RNG is never reseeded.
#[derive(Debug)]
pub struct Device<R = StdRng> {
    id: u32,
    model: LoadModel,
    rng: R,
}

impl Device<StdRng> {
    pub fn new(id: u32) -> Device<StdRng> {
        Device::with_rng(id, StdRng::from_entropy())
    }
}

impl<R: UniformSource> Device<R> {
    pub fn with_rng(id: u32, mut rng: R) -> Device<R> {
        let base_load = rng.uniform(BASE_LOAD_RANGE.0, BASE_LOAD_RANGE.1);
        Device {
            id,
            model: LoadModel::new(base_load),
            rng,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn base_load(&self) -> f64 {
        self.model.base_load()
    }

    pub fn measure_at(&mut self, now: NaiveDateTime) -> Measurement {
        let value = self.model.generate(now.hour(), &mut self.rng);
        Measurement::new(now, self.id, value)
    }

    pub fn measure(&mut self) -> Measurement {
        self.measure_at(Local::now().naive_local())
    }
}
