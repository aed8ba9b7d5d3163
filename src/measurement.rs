use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub minimum: i64,
    pub maximum: i64,
    pub count: u64,
    pub sum: i64
}

impl Measurement {
    pub fn new(value: i64) -> Self {
        Self { minimum: value, maximum: value, count: 1, sum: value }
    }

    #[inline]
    pub fn update(&mut self, value: i64) {
        self.minimum = self.minimum.min(value);
        self.maximum = self.maximum.max(value);
        self.count += 1;
        self.sum += value;
    }

    pub fn merge(&mut self, other: &Self) {
        self.minimum = self.minimum.min(other.minimum);
        self.maximum = self.maximum.max(other.maximum);
        self.count += other.count;
        self.sum += other.sum;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> f64 {
        self.sum as f64 / (self.count as f64 * 10.0)
    }
}

// Sentinels: an accumulator that never saw a value must not be printed.
impl Default for Measurement {
    fn default() -> Self {
        Self { minimum: i64::MAX, maximum: i64::MIN, count: 0, sum: 0 }
    }
}

impl Display for Measurement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_fixed(f, self.minimum)?;
        write!(f, "/{:.1}/", self.mean())?;
        write_fixed(f, self.maximum)
    }
}

fn write_fixed(f: &mut Formatter<'_>, value: i64) -> std::fmt::Result {
    let sign = match value < 0 {
        true => "-",
        false => "",
    };
    let magnitude = value.unsigned_abs();
    write!(f, "{sign}{}.{}", magnitude / 10, magnitude % 10)
}
