//! SWC text reading and writing.
//!
//! One record per line: `id type x y z radius parent`. Blank lines and lines
//! starting with `#` are skipped.

use crate::config::LoadOptions;
use crate::error::{MorphologyError, Result};
use crate::morphology::NeuronMorphology;
use crate::types::SwcRecord;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const FIELD_COUNT: usize = 7;
const HEADER: &str = "# id type x y z radius parent";
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Parse SWC text into records without building a graph.
pub fn parse_records(text: &str) -> Result<Vec<SwcRecord>> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        records.push(parse_line(line, index + 1)?);
    }
    Ok(records)
}

fn parse_line(line: &str, line_no: usize) -> Result<SwcRecord> {
    let location = format!("line {}", line_no);
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < FIELD_COUNT {
        return Err(MorphologyError::malformed(
            location,
            format!("expected {} fields, found {}", FIELD_COUNT, fields.len()),
        ));
    }
    if fields.len() > FIELD_COUNT {
        debug!(line = line_no, extra = fields.len() - FIELD_COUNT, "ignoring extra SWC columns");
    }

    let real = |i: usize, name: &str| -> Result<f64> {
        fields[i]
            .parse::<f64>()
            .map_err(|_| MorphologyError::malformed(&location, format!("invalid {} {:?}", name, fields[i])))
    };
    // Float spellings like `3.0` are accepted only while f64 holds them exactly.
    let integer = |i: usize, name: &str| -> Result<i64> {
        if let Ok(value) = fields[i].parse::<i64>() {
            return Ok(value);
        }
        let value = real(i, name)?;
        if !value.is_finite() || value.fract() != 0.0 || value.abs() > MAX_EXACT_FLOAT {
            return Err(MorphologyError::malformed(
                &location,
                format!("{} must be an integer, found {:?}", name, fields[i]),
            ));
        }
        Ok(value as i64)
    };

    let id = integer(0, "id")?;
    let id = u64::try_from(id)
        .map_err(|_| MorphologyError::malformed(&location, format!("negative id {}", id)))?;

    Ok(SwcRecord {
        id,
        node_type: integer(1, "type")?,
        x: real(2, "x")?,
        y: real(3, "y")?,
        z: real(4, "z")?,
        radius: real(5, "radius")?,
        parent: integer(6, "parent")?,
    })
}

/// Parse SWC text into a morphology.
pub fn read_swc(text: &str, options: &LoadOptions) -> Result<NeuronMorphology> {
    let records = parse_records(text)?;
    NeuronMorphology::from_records(records, options)
}

pub fn load_swc(path: impl AsRef<Path>, options: &LoadOptions) -> Result<NeuronMorphology> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let morphology = read_swc(&text, options)?;
    info!(path = %path.display(), nodes = morphology.len(), "loaded SWC");
    Ok(morphology)
}

/// Render a morphology as SWC text, parents before children.
pub fn write_swc(morphology: &NeuronMorphology) -> String {
    let mut out = String::with_capacity(morphology.len() * 48 + HEADER.len() + 1);
    out.push_str(HEADER);
    out.push('\n');
    for r in morphology.to_records() {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{} {} {} {} {} {} {}",
            r.id, r.node_type, r.x, r.y, r.z, r.radius, r.parent
        );
    }
    out
}

pub fn save_swc(path: impl AsRef<Path>, morphology: &NeuronMorphology) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, write_swc(morphology))?;
    info!(path = %path.display(), nodes = morphology.len(), "saved SWC");
    Ok(())
}
