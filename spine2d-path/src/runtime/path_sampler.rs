use crate::runtime::skeleton::Skeleton;
use crate::{PathAttachmentData, PositionMode, SpacingMode};

const EPSILON: f32 = 1.0e-5;
const NONE: i32 = -1;
const BEFORE: i32 = -2;
const AFTER: i32 = -3;

/// Sub-samples per curve used to map arc length back to the Bézier parameter.
pub(crate) const CURVE_SEGMENTS: usize = 10;

/// Everything needed to place `spaces.len()` samples along one path attachment.
#[derive(Copy, Clone, Debug)]
pub(crate) struct PathSampling<'a> {
    /// Slot showing the path; its bone (or the weighted bones) place the vertices.
    pub(crate) slot_index: usize,
    pub(crate) path: &'a PathAttachmentData,
    pub(crate) position_mode: PositionMode,
    pub(crate) spacing_mode: SpacingMode,
    pub(crate) spaces: &'a [f32],
    pub(crate) tangents: bool,
    pub(crate) position: f32,
}

/// Reusable buffers for [`sample_path`]. Contents are meaningless between calls.
#[derive(Clone, Debug, Default)]
pub(crate) struct SampleBuffers {
    /// `(x, y, angle)` per sample, plus two floats of slack.
    pub(crate) positions: Vec<f32>,
    /// World-space control points of the current curve (or the whole path at constant speed).
    pub(crate) world: Vec<f32>,
    /// Cumulative curve lengths measured from `world` (constant speed only).
    pub(crate) curves: Vec<f32>,
    /// Cumulative sub-sample lengths of the current curve (constant speed only).
    pub(crate) segments: [f32; CURVE_SEGMENTS],
}

impl SampleBuffers {
    pub(crate) fn reserve(&mut self, spaces_count: usize, world_floats: usize, curves: usize) {
        ensure_capacity(&mut self.positions, spaces_count * 3 + 2);
        ensure_capacity(&mut self.world, world_floats);
        ensure_capacity(&mut self.curves, curves);
    }
}

pub(crate) fn ensure_capacity(buffer: &mut Vec<f32>, capacity: usize) {
    if buffer.capacity() < capacity {
        buffer.reserve(capacity - buffer.len());
    }
}

/// Walks the path and writes one `(x, y, angle)` triple per space into `buffers.positions`.
///
/// Positions accumulate: sample `i` sits at `position + sum(spaces[..=i]) * multiplier`. The
/// angle slot holds the tangent when `tangents` is set or when the sample shares its point with
/// the previous one; otherwise it is left at zero. Returns an empty slice when the path has too
/// little data to sample.
pub(crate) fn sample_path<'a>(
    skeleton: &Skeleton,
    sampling: &PathSampling<'_>,
    buffers: &'a mut SampleBuffers,
) -> &'a [f32] {
    let spaces_count = sampling.spaces.len();
    let path = sampling.path;
    let vertices_length = path.vertices.world_vertices_length();
    if vertices_length < 6 || spaces_count == 0 {
        log::warn!(
            "path '{}' cannot be sampled: {} vertex floats, {} spaces",
            path.name,
            vertices_length,
            spaces_count
        );
        buffers.positions.clear();
        return buffers.positions.as_slice();
    }

    buffers.positions.clear();
    buffers.positions.resize(spaces_count * 3 + 2, 0.0);

    let sampled = if path.constant_speed {
        sample_constant_speed(skeleton, sampling, buffers)
    } else {
        sample_precomputed(skeleton, sampling, buffers)
    };
    if !sampled {
        buffers.positions.clear();
    }
    buffers.positions.as_slice()
}

/// A zero gap puts a sample on top of the previous one, so it has no direction of its own.
/// Tested on the unscaled gap, the same value the blender sees.
pub(crate) fn is_shared_point(space: f32) -> bool {
    space.abs() < EPSILON
}

fn path_multiplier(spacing_mode: SpacingMode, path_length: f32, spaces_count: usize) -> f32 {
    match spacing_mode {
        SpacingMode::Percent => path_length,
        SpacingMode::Proportional => path_length / spaces_count as f32,
        SpacingMode::Length | SpacingMode::Fixed => 1.0,
    }
}

/// Moves `cursor` to the curve containing arc length `p` and returns `p` normalized to that
/// curve. Samples may step backwards (negative spacing), so the cursor moves both ways.
fn locate_curve(lengths: &[f32], cursor: &mut usize, mut p: f32) -> f32 {
    *cursor = (*cursor).min(lengths.len().saturating_sub(1));
    while *cursor > 0 && p < lengths[*cursor - 1] {
        *cursor -= 1;
    }
    while *cursor < lengths.len() {
        let length = lengths[*cursor];
        if p > length {
            *cursor += 1;
            continue;
        }
        if *cursor == 0 {
            p /= length.max(EPSILON);
        } else {
            let prev = lengths[*cursor - 1];
            p = (p - prev) / (length - prev).max(EPSILON);
        }
        break;
    }
    p
}

/// Uses the attachment's precomputed cumulative lengths. The Bézier parameter is taken as
/// proportional to arc length inside each curve.
fn sample_precomputed(
    skeleton: &Skeleton,
    sampling: &PathSampling<'_>,
    buffers: &mut SampleBuffers,
) -> bool {
    let path = sampling.path;
    let closed = path.closed;
    let vertices_length = path.vertices.world_vertices_length();
    let spaces_count = sampling.spaces.len();
    let lengths = path.lengths.as_slice();

    let curve_count = (vertices_length / 6) as i64 - if closed { 1 } else { 2 };
    if curve_count < 0 || curve_count as usize >= lengths.len() {
        log::warn!(
            "path '{}' has {} precomputed lengths, needs {}",
            path.name,
            lengths.len(),
            curve_count + 1
        );
        return false;
    }
    let curve_count = curve_count as usize;

    let path_length = lengths[curve_count];
    let mut position = sampling.position;
    if sampling.position_mode == PositionMode::Percent {
        position *= path_length;
    }
    let multiplier = path_multiplier(sampling.spacing_mode, path_length, spaces_count);

    let world = &mut buffers.world;
    world.clear();
    world.resize(8, 0.0);
    let output = buffers.positions.as_mut_slice();

    let mut prev_curve = NONE;
    let mut curve = 0usize;
    for (i, &space) in sampling.spaces.iter().enumerate() {
        let space = space * multiplier;
        position += space;
        let mut p = position;

        if closed {
            p = p.rem_euclid(path_length);
            curve = 0;
        } else if p < 0.0 {
            if prev_curve != BEFORE {
                prev_curve = BEFORE;
                skeleton.compute_world_vertices(
                    sampling.slot_index,
                    &path.vertices,
                    2,
                    4,
                    world,
                    0,
                    2,
                );
            }
            add_before_position(p, world, 0, output, i * 3);
            continue;
        } else if p > path_length {
            if prev_curve != AFTER {
                prev_curve = AFTER;
                skeleton.compute_world_vertices(
                    sampling.slot_index,
                    &path.vertices,
                    vertices_length - 6,
                    4,
                    world,
                    0,
                    2,
                );
            }
            add_after_position(p - path_length, world, 0, output, i * 3);
            continue;
        }

        p = locate_curve(lengths, &mut curve, p);

        if curve as i32 != prev_curve {
            prev_curve = curve as i32;
            if closed && curve == curve_count {
                // The closing curve runs from the last point back to the first.
                skeleton.compute_world_vertices(
                    sampling.slot_index,
                    &path.vertices,
                    vertices_length - 4,
                    4,
                    world,
                    0,
                    2,
                );
                skeleton.compute_world_vertices(
                    sampling.slot_index,
                    &path.vertices,
                    0,
                    4,
                    world,
                    4,
                    2,
                );
            } else {
                skeleton.compute_world_vertices(
                    sampling.slot_index,
                    &path.vertices,
                    curve * 6 + 2,
                    8,
                    world,
                    0,
                    2,
                );
            }
        }

        add_curve_position(
            p,
            [
                world[0], world[1], world[2], world[3], world[4], world[5], world[6], world[7],
            ],
            output,
            i * 3,
            sampling.tangents || (i > 0 && is_shared_point(sampling.spaces[i])),
        );
    }

    true
}

/// Measures the path from its world vertices and samples it by true arc length.
fn sample_constant_speed(
    skeleton: &Skeleton,
    sampling: &PathSampling<'_>,
    buffers: &mut SampleBuffers,
) -> bool {
    let path = sampling.path;
    let closed = path.closed;
    let spaces_count = sampling.spaces.len();
    let mut vertices_length = path.vertices.world_vertices_length();
    let mut curve_count = vertices_length / 6;

    let world = &mut buffers.world;
    world.clear();
    if closed {
        // Close the loop by repeating the first point after the first in-handle.
        vertices_length += 2;
        world.resize(vertices_length, 0.0);
        skeleton.compute_world_vertices(
            sampling.slot_index,
            &path.vertices,
            2,
            vertices_length - 4,
            world,
            0,
            2,
        );
        skeleton.compute_world_vertices(
            sampling.slot_index,
            &path.vertices,
            0,
            2,
            world,
            vertices_length - 4,
            2,
        );
        world[vertices_length - 2] = world[0];
        world[vertices_length - 1] = world[1];
    } else {
        // Drop the first in-handle and the last out-handle.
        curve_count -= 1;
        vertices_length -= 4;
        world.resize(vertices_length, 0.0);
        skeleton.compute_world_vertices(
            sampling.slot_index,
            &path.vertices,
            2,
            vertices_length,
            world,
            0,
            2,
        );
    }
    let world = world.as_slice();

    let curves = &mut buffers.curves;
    curves.clear();
    curves.reserve(curve_count);
    let mut path_length = 0.0f32;
    for curve in 0..curve_count {
        let w = curve * 6;
        path_length += estimate_curve_length(curve_points(world, w));
        curves.push(path_length);
    }
    let curves = curves.as_slice();

    let mut position = sampling.position;
    if sampling.position_mode == PositionMode::Percent {
        position *= path_length;
    }
    let multiplier = path_multiplier(sampling.spacing_mode, path_length, spaces_count);

    let output = buffers.positions.as_mut_slice();
    let segments = &mut buffers.segments;
    let mut points = [0.0f32; 8];
    let mut curve_length = 0.0f32;
    let mut prev_curve = NONE;
    let mut curve = 0usize;
    let mut segment = 0usize;

    for (i, &space) in sampling.spaces.iter().enumerate() {
        let space = space * multiplier;
        position += space;
        let mut p = position;

        if closed {
            p = p.rem_euclid(path_length);
            curve = 0;
        } else if p < 0.0 {
            add_before_position(p, world, 0, output, i * 3);
            continue;
        } else if p > path_length {
            add_after_position(p - path_length, world, vertices_length - 4, output, i * 3);
            continue;
        }

        p = locate_curve(curves, &mut curve, p);

        if curve as i32 != prev_curve {
            prev_curve = curve as i32;
            points = curve_points(world, curve * 6);
            curve_length = measure_curve_segments(points, segments);
            segment = 0;
        }

        // Map the curve-local fraction to arc length, then back to a Bézier parameter through
        // the sub-sample table.
        p *= curve_length;
        while segment > 0 && p < segments[segment - 1] {
            segment -= 1;
        }
        loop {
            let length = segments[segment];
            if p > length {
                segment += 1;
                if segment >= CURVE_SEGMENTS {
                    segment = CURVE_SEGMENTS - 1;
                    p = CURVE_SEGMENTS as f32;
                    break;
                }
                continue;
            }
            if segment == 0 {
                p /= length.max(EPSILON);
            } else {
                let prev = segments[segment - 1];
                p = segment as f32 + (p - prev) / (length - prev).max(EPSILON);
            }
            break;
        }

        add_curve_position(
            p * 0.1,
            points,
            output,
            i * 3,
            sampling.tangents || (i > 0 && is_shared_point(sampling.spaces[i])),
        );
    }

    true
}

/// `[x1, y1, cx1, cy1, cx2, cy2, x2, y2]` starting at float `w`, zero-filled past the end.
fn curve_points(world: &[f32], w: usize) -> [f32; 8] {
    let mut points = [0.0f32; 8];
    for (k, point) in points.iter_mut().enumerate() {
        *point = world.get(w + k).copied().unwrap_or(0.0);
    }
    points
}

/// Length of one cubic curve, estimated by forward differencing over 4 steps.
pub(crate) fn estimate_curve_length(points: [f32; 8]) -> f32 {
    let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = points;
    let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.1875;
    let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.1875;
    let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.09375;
    let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.09375;
    let mut ddfx = tmpx * 2.0 + dddfx;
    let mut ddfy = tmpy * 2.0 + dddfy;
    let mut dfx = (cx1 - x1) * 0.75 + tmpx + dddfx * 0.16666667;
    let mut dfy = (cy1 - y1) * 0.75 + tmpy + dddfy * 0.16666667;

    let mut length = (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx;
    dfy += ddfy;
    ddfx += dddfx;
    ddfy += dddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx;
    dfy += ddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx + dddfx;
    dfy += ddfy + dddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    length
}

/// Fills `segments` with the cumulative length at each tenth of the curve parameter and returns
/// the total.
pub(crate) fn measure_curve_segments(
    points: [f32; 8],
    segments: &mut [f32; CURVE_SEGMENTS],
) -> f32 {
    let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = points;
    let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.03;
    let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.03;
    let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.006;
    let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.006;
    let mut ddfx = tmpx * 2.0 + dddfx;
    let mut ddfy = tmpy * 2.0 + dddfy;
    let mut dfx = (cx1 - x1) * 0.3 + tmpx + dddfx * 0.16666667;
    let mut dfy = (cy1 - y1) * 0.3 + tmpy + dddfy * 0.16666667;

    let mut curve_length = (dfx * dfx + dfy * dfy).sqrt();
    segments[0] = curve_length;
    for seg in segments.iter_mut().take(8).skip(1) {
        dfx += ddfx;
        dfy += ddfy;
        ddfx += dddfx;
        ddfy += dddfy;
        curve_length += (dfx * dfx + dfy * dfy).sqrt();
        *seg = curve_length;
    }
    dfx += ddfx;
    dfy += ddfy;
    curve_length += (dfx * dfx + dfy * dfy).sqrt();
    segments[8] = curve_length;
    dfx += ddfx + dddfx;
    dfy += ddfy + dddfy;
    curve_length += (dfx * dfx + dfy * dfy).sqrt();
    segments[9] = curve_length;
    curve_length
}

/// Extends the path backwards from its first point along the first curve's start direction.
pub(crate) fn add_before_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp.get(i).copied().unwrap_or(0.0);
    let y1 = temp.get(i + 1).copied().unwrap_or(0.0);
    let dx = temp.get(i + 2).copied().unwrap_or(x1) - x1;
    let dy = temp.get(i + 3).copied().unwrap_or(y1) - y1;
    let r = dy.atan2(dx);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

/// Extends the path forwards from its last point along the last curve's end direction.
pub(crate) fn add_after_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp.get(i + 2).copied().unwrap_or(0.0);
    let y1 = temp.get(i + 3).copied().unwrap_or(0.0);
    let dx = x1 - temp.get(i).copied().unwrap_or(x1);
    let dy = y1 - temp.get(i + 1).copied().unwrap_or(y1);
    let r = dy.atan2(dx);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

/// Evaluates the cubic Bézier at parameter `p` and, when `tangents` is set, its direction.
pub(crate) fn add_curve_position(
    p: f32,
    points: [f32; 8],
    output: &mut [f32],
    o: usize,
    tangents: bool,
) {
    let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = points;
    if p < EPSILON || p.is_nan() {
        output[o] = x1;
        output[o + 1] = y1;
        output[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }
    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    output[o] = x;
    output[o + 1] = y;
    if tangents {
        if p < 0.001 {
            output[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        } else {
            output[o + 2] = (y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt))
                .atan2(x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt));
        }
    }
}
