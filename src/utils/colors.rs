//! Diverging color ramps for map overlays.
//!
//! Map renderers bucket flux values by standard score and look styles up by
//! class index. The ramps are Cynthia Brewer's diverging scales
//! (colorbrewer2.org), ordered warm to cool, so positive scores map to the
//! front of the ramp and negative scores to the back.

use crate::stats::z_score;

/// An ordered diverging color scale with an odd number of entries.
#[derive(Debug, Clone)]
pub struct ColorRamp {
    name: String,
    base: Vec<(u8, u8, u8)>,
}

impl ColorRamp {
    /// Brewer BrBG, 11 classes.
    pub fn brbg11() -> Self {
        Self {
            name: "brbg11".to_string(),
            base: vec![
                (84, 48, 5),
                (140, 81, 10),
                (191, 129, 45),
                (223, 194, 125),
                (246, 232, 195),
                (245, 245, 245),
                (199, 234, 229),
                (128, 205, 193),
                (53, 151, 143),
                (1, 102, 94),
                (0, 60, 48),
            ],
        }
    }

    /// Brewer RdBu, 3 classes.
    pub fn rdbu3() -> Self {
        Self {
            name: "rdbu3".to_string(),
            base: vec![(239, 138, 98), (247, 247, 247), (103, 169, 207)],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Number of score classes on either side of the mean.
    pub fn score_length(&self) -> i64 {
        (self.base.len() / 2) as i64
    }

    /// `#rrggbb` codes for each ramp entry.
    pub fn hex_colors(&self) -> Vec<String> {
        self.base
            .iter()
            .map(|(r, g, b)| format!("#{:02x}{:02x}{:02x}", r, g, b))
            .collect()
    }

    /// KML `aabbggrr` color strings for each ramp entry.
    pub fn kml_colors(&self, alpha: f64) -> Vec<String> {
        let a = (alpha.clamp(0.0, 1.0) * 255.0) as u8;
        self.base
            .iter()
            .map(|(r, g, b)| format!("{:02x}{:02x}{:02x}{:02x}", a, b, g, r))
            .collect()
    }

    /// Style identifier for a score class, e.g. `#brbg11+2` or `#brbg11-1`.
    pub fn style_id(&self, score: i64) -> String {
        if score >= 0 {
            format!("#{}+{}", self.name, score)
        } else {
            format!("#{}{}", self.name, score)
        }
    }

    /// Legend labels, one per ramp entry, from the highest score class down.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.base.len());
        let mut i = self.score_length();
        for _ in &self.base {
            if i > 0 {
                labels.push(format!("z Score: +{}", i));
            } else {
                labels.push(format!("z Score: {}", i));
            }
            i -= 1;
        }
        labels
    }

    /// Pairs each hex color with its legend label.
    pub fn legend_entries(&self) -> Vec<(String, String)> {
        self.hex_colors().into_iter().zip(self.labels()).collect()
    }

    /// Buckets a value into a score class, clamped to the ramp's range.
    pub fn score_class(&self, value: f64, mean: f64, std: f64) -> i64 {
        let bound = self.score_length();
        if std == 0.0 {
            return 0;
        }
        let score = z_score(value, mean, std).ceil() as i64;
        score.clamp(-bound, bound)
    }
}
