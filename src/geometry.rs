//! Distance and direction along a single grid axis, bounded or toroidal.

use crate::error::{CellGridError, Result};

/// Squared distance between two positions on one axis, ignoring any edge.
#[inline(always)]
pub fn squared_distance(pos1: f64, pos2: f64) -> f64 {
    (pos1 - pos2) * (pos1 - pos2)
}

/// Signed difference between two positions measured across the grid edge.
#[inline(always)]
pub fn subtract_via_edge(pos1: f64, pos2: f64, len: f64) -> f64 {
    if pos1 > pos2 {
        (len - pos1) + pos2 // across the right edge
    } else {
        (pos2 - len) - pos1 // across the left edge
    }
}

#[inline(always)]
pub fn squared_distance_via_edge(pos1: f64, pos2: f64, len: f64) -> f64 {
    let d = subtract_via_edge(pos1, pos2, len);
    d * d
}

/// Squared distance on a wrapping axis of length `len`: the shorter of the
/// direct path and the path over the edge.
#[inline(always)]
pub fn squared_distance_on_torus(pos1: f64, pos2: f64, len: f64) -> f64 {
    squared_distance(pos1, pos2).min(squared_distance_via_edge(pos1, pos2, len))
}

/// Euclidean distance between two grid points.
///
/// With `torus` set, each axis uses the wrapped distance and both extents are required.
pub fn euclidean_distance(
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    xlen: Option<f64>,
    ylen: Option<f64>,
    torus: bool,
) -> Result<f64> {
    if torus {
        let (xlen, ylen) = match (xlen, ylen) {
            (Some(xlen), Some(ylen)) => (xlen, ylen),
            _ => {
                return Err(CellGridError::InvalidArgument(
                    "torus distance needs both grid extents".into(),
                ))
            }
        };
        let dx = squared_distance_on_torus(x1, x2, xlen);
        let dy = squared_distance_on_torus(y1, y2, ylen);
        Ok((dx + dy).sqrt())
    } else {
        Ok((squared_distance(x1, x2) + squared_distance(y1, y2)).sqrt())
    }
}

/// Signed shortest offset from `my_pos` to `target_pos` along one axis.
///
/// Positive means the target lies "right" of `my_pos`. On a torus the wrapped
/// path wins only when it is strictly shorter than the direct one.
pub fn shortest_distance_to_target(
    my_pos: f64,
    target_pos: f64,
    len: Option<f64>,
    torus: bool,
) -> Result<f64> {
    let direct_distance = target_pos - my_pos;
    if !torus {
        return Ok(direct_distance);
    }
    let len = len.ok_or_else(|| {
        CellGridError::InvalidArgument("torus direction needs the axis length".into())
    })?;

    let edge_distance = if my_pos >= target_pos {
        target_pos + len - my_pos
    } else {
        -(my_pos + len - target_pos)
    };

    if direct_distance.abs() <= edge_distance.abs() {
        Ok(direct_distance)
    } else {
        Ok(edge_distance)
    }
}

/// Unit step (-1, 0 or 1) towards `target_pos` along one axis.
pub fn direction_to_target(
    my_pos: f64,
    target_pos: f64,
    len: Option<f64>,
    torus: bool,
) -> Result<i32> {
    if target_pos == my_pos {
        return Ok(0);
    }
    let distance = shortest_distance_to_target(my_pos, target_pos, len, torus)?;
    Ok(if distance > 0.0 { 1 } else { -1 })
}

/// Maps `val` from the scale [min1, max1] onto [min2, max2], clamped to the target scale.
/// A degenerate source scale returns `val` unchanged.
pub fn rescale(val: f64, min1: f64, max1: f64, min2: f64, max2: f64) -> f64 {
    if min1 == max1 {
        return val;
    }
    let rescaled = ((val - min1) / (max1 - min1)) * (max2 - min2) + min2;
    rescaled.clamp(min2, max2)
}
