//! Synthetic instrument documents.
//!
//! Renders a complete vendor document for one emission line measured on a
//! doubling concentration series. The recorded peak saturates like a line
//! under self-absorption:
//!
//! ```text
//! peak(c) = sensitivity · c / (1 + c / saturation)
//! ```
//!
//! Each replicate waveform is a Gaussian peak on a constant background with
//! seeded noise. The document also carries the decoys a real export has: a
//! hidden line column, a non-line column, a disabled replicate and a hidden
//! probe, none of which may reach the calibration table.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::AppError;
use crate::io::binary::{encode_f32_array, encode_i32_array};
use crate::report::xml::escape_attribute;

pub const LINE_COLUMN_ID: &str = "101";
pub const LINE_NICKNAME: &str = "Cu 324.754";

const HIDDEN_COLUMN_ID: &str = "102";
const TEXT_COLUMN_ID: &str = "103";

#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    pub seed: u64,
    /// Number of calibration probes (excluding the blank).
    pub probes: usize,
    /// Replicate runs per probe.
    pub parallels: usize,
    /// Samples per waveform.
    pub size: usize,
    /// Name of an extra blank probe; `None` leaves it out.
    pub blank: Option<String>,
    /// Concentration of the first probe; each next probe doubles it.
    pub base_concentration: f64,
    pub sensitivity: f64,
    pub saturation: f64,
    pub background: f64,
    /// Standard deviation of the additive waveform noise.
    pub noise: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            probes: 8,
            parallels: 2,
            size: 32,
            blank: Some("Blank".to_string()),
            base_concentration: 0.001,
            sensitivity: 1000.0,
            saturation: 0.05,
            background: 0.05,
            noise: 0.002,
        }
    }
}

impl SynthConfig {
    pub fn concentration(&self, probe: usize) -> f64 {
        self.base_concentration * 2f64.powi(probe as i32)
    }

    pub fn peak(&self, concentration: f64) -> f64 {
        self.sensitivity * concentration / (1.0 + concentration / self.saturation)
    }
}

/// Render the document for `config`. Same config, same bytes.
pub fn generate(config: &SynthConfig) -> Result<String, AppError> {
    if config.probes < 2 {
        return Err(AppError::new(2, "Synthetic data needs at least 2 probes."));
    }
    if config.parallels == 0 || config.size < 3 {
        return Err(AppError::new(2, "Synthetic data needs at least 1 parallel and 3 samples per waveform."));
    }
    let positive = [
        config.base_concentration,
        config.sensitivity,
        config.saturation,
    ];
    if !positive.iter().all(|v| v.is_finite() && *v > 0.0) || !(config.noise >= 0.0 && config.background.is_finite()) {
        return Err(AppError::new(2, "Invalid synthetic response parameters."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<root>\n");
    out.push_str(&format!(
        "<titul><organization>Synthetic Lab</organization><device>abscor synth</device>\
         <user>demo</user><aname>Synthetic series (seed {})</aname></titul>\n",
        config.seed
    ));

    out.push_str("<columns>\n<sheet>\n");
    let cells: String = (0..config.probes)
        .map(|i| format!("<pc i=\"p{}\" cm=\"{}\"/>", i + 1, config.concentration(i)))
        .collect();
    out.push_str(&format!(
        "<column id=\"{LINE_COLUMN_ID}\" name=\"{}\" type=\"line\" visible=\"yes\"><cells>{cells}</cells></column>\n",
        escape_attribute(LINE_NICKNAME)
    ));
    out.push_str(&format!(
        "<column id=\"{HIDDEN_COLUMN_ID}\" name=\"Cu 327.396\" type=\"line\" visible=\"no\"><cells>{cells}</cells></column>\n"
    ));
    out.push_str(&format!(
        "<column id=\"{TEXT_COLUMN_ID}\" name=\"Comment\" type=\"text\" visible=\"yes\"/>\n"
    ));
    out.push_str("</sheet>\n</columns>\n<probes>\n");

    let waveform = |peak: f64, masked: Option<usize>, rng: &mut StdRng| -> (String, Option<String>) {
        let center = (config.size / 2) as f64;
        let width = (config.size as f64 / 8.0).max(1.0);
        let mut values: Vec<f64> = (0..config.size)
            .map(|j| {
                let z = (j as f64 - center) / width;
                config.background + peak * (-0.5 * z * z).exp() + config.noise * normal.sample(&mut *rng)
            })
            .collect();
        // A masked sample is a detector spike that must not become the peak.
        let mask = masked.map(|index| {
            values[index] = 10.0 * (peak + config.background + 1.0);
            encode_i32_array(&[index as i32])
        });
        (encode_f32_array(&values), mask)
    };

    let graph = |column_id: &str, peak: f64, masked: Option<usize>, rng: &mut StdRng| -> String {
        let (yvals, mask) = waveform(peak, masked, rng);
        let bad = mask.map(|m| format!("<bad>{m}</bad>")).unwrap_or_default();
        format!(
            "<graph id=\"{column_id}\"><yvals value_array_size=\"{}\">{yvals}</yvals>{bad}</graph>",
            config.size
        )
    };

    let probe = |id: &str, name: &str, visible: &str, peak: f64, rng: &mut StdRng| -> String {
        let mut text = format!(
            "<probe id=\"{id}\" name=\"{}\" visible=\"{visible}\">\n",
            escape_attribute(name)
        );
        for k in 0..config.parallels {
            let masked = (k % 2 == 1).then_some(0);
            let jitter = 1.0 + 0.01 * normal.sample(&mut *rng);
            text.push_str(&format!("<spe name=\"{}\" disabled=\"no\"><graphs>", k + 1));
            text.push_str(&graph(LINE_COLUMN_ID, peak * jitter, masked, rng));
            text.push_str(&graph(HIDDEN_COLUMN_ID, 2.0 * peak, None, rng));
            text.push_str(&graph(TEXT_COLUMN_ID, 0.0, None, rng));
            text.push_str("</graphs></spe>\n");
        }
        text.push_str(&format!(
            "<spe name=\"{}\" disabled=\"yes\"><graphs>{}</graphs></spe>\n",
            config.parallels + 1,
            graph(LINE_COLUMN_ID, 50.0 * (peak + 1.0), None, rng)
        ));
        text.push_str("</probe>\n");
        text
    };

    if let Some(blank) = &config.blank {
        out.push_str(&probe("blank", blank, "yes", 0.0, &mut rng));
    }
    for i in 0..config.probes {
        let peak = config.peak(config.concentration(i));
        out.push_str(&probe(&format!("p{}", i + 1), &format!("Sample{}", i + 1), "yes", peak, &mut rng));
    }
    out.push_str(&probe("hidden", "Hidden", "no", 1.0e6, &mut rng));

    out.push_str("</probes>\n</root>\n");
    Ok(out)
}
