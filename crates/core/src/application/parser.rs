// Result file parsers (I(q) and I(qx, qy))

use crate::domain::{Grid2d, IqPoint, PlotData, PlotKind};

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// First `n` whitespace-separated columns as floats; trailing columns are
/// not inspected
fn leading_columns(line: &str, n: usize) -> Option<Vec<f64>> {
    let cols: Vec<f64> = line
        .split_whitespace()
        .take(n)
        .map(|token| token.parse::<f64>().ok())
        .collect::<Option<_>>()?;
    (cols.len() == n).then_some(cols)
}

/// Parse a 1D `*_Iq.txt` export.
///
/// Rows whose first three columns (q, I, dI) are numeric are kept, whatever
/// follows them; anything else is skipped. File order is kept.
pub fn parse_iq(content: &[u8]) -> Vec<IqPoint> {
    let text = String::from_utf8_lossy(content);
    text.lines()
        .filter_map(|line| {
            let cols = leading_columns(line, 3)?;
            Some(IqPoint::new(
                finite_or_zero(cols[0]),
                finite_or_zero(cols[1]),
                finite_or_zero(cols[2]),
            ))
        })
        .collect()
}

fn axis_index(axis: &mut Vec<f64>, value: f64) -> usize {
    match axis.iter().position(|v| *v == value) {
        Some(i) => i,
        None => {
            axis.push(value);
            axis.len() - 1
        }
    }
}

/// Parse a 2D `*_Iqxy.dat` export (`qx qy I [dI]` rows).
///
/// Distinct qx / qy values in file order form the axes. Cells that are
/// missing or non-finite are 0.0.
pub fn parse_iqxy(content: &[u8]) -> Grid2d {
    let text = String::from_utf8_lossy(content);
    let mut qx = Vec::new();
    let mut qy = Vec::new();
    let mut cells = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some(cols) = leading_columns(trimmed, 3) else {
            continue;
        };
        if !cols[0].is_finite() || !cols[1].is_finite() {
            continue;
        }
        let x = axis_index(&mut qx, cols[0]);
        let y = axis_index(&mut qy, cols[1]);
        cells.push((x, y, finite_or_zero(cols[2])));
    }

    let mut values = vec![vec![0.0; qx.len()]; qy.len()];
    for (x, y, intensity) in cells {
        values[y][x] = intensity;
    }

    Grid2d::new(values, qx, qy)
}

/// Parser for a given result file kind
pub fn parse(kind: PlotKind, content: &[u8]) -> PlotData {
    match kind {
        PlotKind::OneD => PlotData::OneD(parse_iq(content)),
        PlotKind::TwoD => PlotData::TwoD(parse_iqxy(content)),
    }
}
