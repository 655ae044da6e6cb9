use log::debug;
use nalgebra::{Point2, Vector2};

use chesscal_core::PatternSize;

use crate::corners::Corner;

/// Estimate the dominant corner orientation from ChESS orientations.
///
/// Orientations are defined modulo pi, so the mean is taken in
/// double-angle space, weighted by corner strength.
fn dominant_orientation(corners: &[&Corner]) -> Option<f64> {
    let mut sum = Vector2::<f64>::zeros();
    let mut weight_sum = 0.0f64;

    for c in corners {
        let w = f64::from(c.strength.max(0.0));
        if w <= 0.0 {
            continue;
        }
        let two_theta = 2.0 * f64::from(c.orientation);
        sum += w * Vector2::new(two_theta.cos(), two_theta.sin());
        weight_sum += w;
    }

    if weight_sum <= 0.0 {
        return None;
    }

    let mean = sum / weight_sum;
    if mean.norm_squared() < 1e-6 {
        // No dominant orientation.
        return None;
    }

    Some(0.5 * mean.y.atan2(mean.x))
}

/// Split `items` (corner index, coordinate) into `n_bands` runs of
/// `band_size` by cutting at the `n_bands - 1` largest coordinate gaps.
///
/// Returns the bands ordered by ascending coordinate, or `None` when the
/// cuts do not produce equally sized runs.
fn split_by_largest_gaps(
    mut items: Vec<(usize, f64)>,
    n_bands: usize,
    band_size: usize,
) -> Option<Vec<Vec<usize>>> {
    if n_bands == 0 || items.len() != n_bands * band_size {
        return None;
    }
    items.sort_by(|a, b| a.1.total_cmp(&b.1));

    if n_bands == 1 {
        return Some(vec![items.iter().map(|it| it.0).collect()]);
    }

    let mut gaps: Vec<(usize, f64)> = items
        .windows(2)
        .enumerate()
        .map(|(i, w)| (i, w[1].1 - w[0].1))
        .collect();
    gaps.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut cuts: Vec<usize> = gaps[..n_bands - 1].iter().map(|g| g.0 + 1).collect();
    cuts.sort_unstable();

    let mut bands = Vec::with_capacity(n_bands);
    let mut start = 0usize;
    for &cut in cuts.iter().chain(std::iter::once(&items.len())) {
        if cut - start != band_size {
            return None;
        }
        bands.push(items[start..cut].iter().map(|it| it.0).collect());
        start = cut;
    }
    Some(bands)
}

/// Order a cloud of ChESS corners into a row-major `rows x cols` grid.
///
/// The corner positions are rotated into the board frame using the
/// dominant orientation, then partitioned into rows by the largest gaps
/// along the vertical board axis. If the partition fails, the transposed
/// layout is tried and re-indexed by a quarter-turn so the output stays
/// row-major with exactly `cols` entries per row.
///
/// Returns `None` when the corners do not form a complete grid. The
/// resulting ordering is canonical up to a half-turn of the board, which
/// leaves the calibration geometry unchanged.
pub fn assemble_grid(corners: &[Corner], pattern: PatternSize) -> Option<Vec<Point2<f64>>> {
    let need = pattern.point_count();
    if corners.len() < need {
        debug!(
            "grid assembly: {} corners, need {} for {}x{}",
            corners.len(),
            need,
            pattern.rows,
            pattern.cols
        );
        return None;
    }

    let mut picked: Vec<&Corner> = corners.iter().collect();
    if picked.len() > need {
        // Keep the strongest responses; extras are usually clutter
        // outside the board.
        picked.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        picked.truncate(need);
    }

    // Axis estimate over the kept corners only.
    let theta = dominant_orientation(&picked)?;
    let (sin_t, cos_t) = theta.sin_cos();

    // Board-frame coordinates: u along the dominant axis, v orthogonal.
    let uv: Vec<Vector2<f64>> = picked
        .iter()
        .map(|c| {
            Vector2::new(
                c.position.x * cos_t + c.position.y * sin_t,
                -c.position.x * sin_t + c.position.y * cos_t,
            )
        })
        .collect();

    let rows = pattern.rows as usize;
    let cols = pattern.cols as usize;

    let by_v: Vec<(usize, f64)> = uv.iter().enumerate().map(|(i, p)| (i, p.y)).collect();
    if let Some(mut bands) = split_by_largest_gaps(by_v, rows, cols) {
        for band in &mut bands {
            band.sort_by(|&a, &b| uv[a].x.total_cmp(&uv[b].x));
        }
        let mut out = Vec::with_capacity(need);
        for band in &bands {
            out.extend(band.iter().map(|&i| picked[i].position));
        }
        return Some(out);
    }

    // The dominant axis may run along the columns instead; partition the
    // transposed layout and rotate the indexing by a quarter turn.
    let flipped = pattern.transposed();
    let by_v: Vec<(usize, f64)> = uv.iter().enumerate().map(|(i, p)| (i, p.y)).collect();
    if let Some(mut bands) = split_by_largest_gaps(
        by_v,
        flipped.rows as usize,
        flipped.cols as usize,
    ) {
        for band in &mut bands {
            band.sort_by(|&a, &b| uv[a].x.total_cmp(&uv[b].x));
        }
        let mut out = Vec::with_capacity(need);
        for r in 0..rows {
            for band in bands.iter().take(cols) {
                out.push(picked[band[rows - 1 - r]].position);
            }
        }
        return Some(out);
    }

    debug!("grid assembly: no consistent {rows}x{cols} banding found");
    None
}
