//! Sequential red color scale for fire counts.

/// `ColorBrewer` "Reds", nine classes, lightest first.
const REDS: [[u8; 3]; 9] = [
    [0xff, 0xf5, 0xf0],
    [0xfe, 0xe0, 0xd2],
    [0xfc, 0xbb, 0xa1],
    [0xfc, 0x92, 0x72],
    [0xfb, 0x6a, 0x4a],
    [0xef, 0x3b, 0x2c],
    [0xcb, 0x18, 0x1d],
    [0xa5, 0x0f, 0x15],
    [0x67, 0x00, 0x0d],
];

/// Maps counts in `[min, max]` onto the red ramp by linear interpolation.
///
/// Higher counts never get a lighter color than lower counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorScale {
    min: u64,
    max: u64,
}

impl ColorScale {
    /// Scale spanning the given counts. An empty iterator gives `0..=0`.
    #[must_use]
    pub fn from_counts(counts: impl IntoIterator<Item = u64>) -> Self {
        let (min, max) = counts
            .into_iter()
            .fold(None, |range: Option<(u64, u64)>, c| {
                Some(range.map_or((c, c), |(lo, hi)| (lo.min(c), hi.max(c))))
            })
            .unwrap_or((0, 0));
        Self { min, max }
    }

    /// Lowest count on the scale.
    #[must_use]
    pub const fn min(&self) -> u64 {
        self.min
    }

    /// Highest count on the scale.
    #[must_use]
    pub const fn max(&self) -> u64 {
        self.max
    }

    /// Position of `count` along the scale, clamped to `0.0..=1.0`. A scale
    /// with a single value maps everything to the lightest color.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn position(&self, count: u64) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        let count = count.clamp(self.min, self.max);
        (count - self.min) as f64 / (self.max - self.min) as f64
    }

    /// RGB color for `count`.
    #[must_use]
    pub fn color(&self, count: u64) -> [u8; 3] {
        ramp(self.position(count))
    }
}

/// RGB color at `t` (`0.0..=1.0`) along the red ramp.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn ramp(t: f64) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0) * (REDS.len() - 1) as f64;
    let lower = (t.floor() as usize).min(REDS.len() - 2);
    let frac = t - lower as f64;

    let a = REDS[lower];
    let b = REDS[lower + 1];
    std::array::from_fn(|i| {
        let (a, b) = (f64::from(a[i]), f64::from(b[i]));
        (b - a).mul_add(frac, a).round() as u8
    })
}

/// CSS hex notation, e.g. `#fb6a4a`.
#[must_use]
pub fn hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}
