use super::path_sampler::{
    PathSampling, SampleBuffers, add_curve_position, estimate_curve_length,
    measure_curve_segments, sample_path,
};
use crate::{
    AttachmentData, BoneData, MeshVertices, PathAttachmentData, PositionMode, Skeleton,
    SkeletonData, SkinData, SlotData, SpacingMode,
};
use std::sync::Arc;

fn assert_approx_eps(actual: f32, expected: f32, eps: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= eps,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn assert_approx(actual: f32, expected: f32) {
    assert_approx_eps(actual, expected, 1.0e-3);
}

/// Open path along the x axis from 0 to 10 with handles at the thirds.
fn straight_open_path(constant_speed: bool) -> PathAttachmentData {
    PathAttachmentData {
        name: "line".to_string(),
        vertices: MeshVertices::Unweighted(vec![
            [-3.333_333_3, 0.0],
            [0.0, 0.0],
            [3.333_333_3, 0.0],
            [6.666_666_5, 0.0],
            [10.0, 0.0],
            [13.333_333, 0.0],
        ]),
        lengths: vec![10.0],
        closed: false,
        constant_speed,
    }
}

/// Closed path running 0 -> 10 along the x axis and back, 20 units long, handles at the thirds.
fn closed_loop_path(constant_speed: bool) -> PathAttachmentData {
    PathAttachmentData {
        name: "loop".to_string(),
        vertices: MeshVertices::Unweighted(vec![
            [3.333_333_3, 0.0],
            [0.0, 0.0],
            [3.333_333_3, 0.0],
            [6.666_666_5, 0.0],
            [10.0, 0.0],
            [6.666_666_5, 0.0],
        ]),
        lengths: vec![10.0, 20.0],
        closed: true,
        constant_speed,
    }
}

/// A single arch, mirror-symmetric about x = 5.
fn arch_path(constant_speed: bool) -> PathAttachmentData {
    PathAttachmentData {
        name: "arch".to_string(),
        vertices: MeshVertices::Unweighted(vec![
            [0.0, -10.0],
            [0.0, 0.0],
            [0.0, 10.0],
            [10.0, 10.0],
            [10.0, 0.0],
            [10.0, -10.0],
        ]),
        lengths: vec![20.0],
        closed: false,
        constant_speed,
    }
}

/// Open path along the x axis from 0 to 20 made of two 10-unit curves.
fn two_curve_line(constant_speed: bool) -> PathAttachmentData {
    PathAttachmentData {
        name: "long".to_string(),
        vertices: MeshVertices::Unweighted(vec![
            [-3.333_333_3, 0.0],
            [0.0, 0.0],
            [3.333_333_3, 0.0],
            [6.666_666_5, 0.0],
            [10.0, 0.0],
            [13.333_333, 0.0],
            [16.666_666, 0.0],
            [20.0, 0.0],
            [23.333_334, 0.0],
        ]),
        lengths: vec![10.0, 20.0],
        closed: false,
        constant_speed,
    }
}

fn arch_length(skeleton: &Skeleton, constant_speed: bool) -> f32 {
    if !constant_speed {
        return 20.0;
    }
    let Some(AttachmentData::Path(path)) = skeleton.slot_attachment_data(0) else {
        panic!("slot 0 should show a path");
    };
    let MeshVertices::Unweighted(v) = &path.vertices else {
        panic!("arch is unweighted");
    };
    estimate_curve_length([
        v[1][0], v[1][1], v[2][0], v[2][1], v[3][0], v[3][1], v[4][0], v[4][1],
    ])
}

fn skeleton_with_path(path: PathAttachmentData) -> Skeleton {
    let mut data = SkeletonData::default();
    data.bones.push(BoneData::new("root", None));
    data.slots.push(SlotData {
        name: "path".to_string(),
        bone: 0,
        attachment: Some(path.name.clone()),
    });
    let mut skin = SkinData::new("default", 1);
    skin.set_attachment(0, path.name.clone(), AttachmentData::Path(path));
    data.skins.insert("default".to_string(), skin);

    let mut skeleton = Skeleton::new(Arc::new(data)).unwrap();
    skeleton.update_world_transform();
    skeleton
}

fn sample(
    skeleton: &Skeleton,
    position_mode: PositionMode,
    spacing_mode: SpacingMode,
    spaces: &[f32],
    tangents: bool,
    position: f32,
) -> Vec<f32> {
    let Some(AttachmentData::Path(path)) = skeleton.slot_attachment_data(0) else {
        panic!("slot 0 should show a path");
    };
    let mut buffers = SampleBuffers::default();
    let sampling = PathSampling {
        slot_index: 0,
        path,
        position_mode,
        spacing_mode,
        spaces,
        tangents,
        position,
    };
    sample_path(skeleton, &sampling, &mut buffers).to_vec()
}

fn sample_fixed(skeleton: &Skeleton, position: f32) -> [f32; 3] {
    let out = sample(
        skeleton,
        PositionMode::Fixed,
        SpacingMode::Fixed,
        &[0.0],
        true,
        position,
    );
    [out[0], out[1], out[2]]
}

#[test]
fn closed_path_wraps_positions_past_either_end() {
    for constant_speed in [true, false] {
        let skeleton = skeleton_with_path(closed_loop_path(constant_speed));

        let inside = sample_fixed(&skeleton, 3.0);
        let past_end = sample_fixed(&skeleton, 23.0);
        assert_approx(past_end[0], inside[0]);
        assert_approx(past_end[1], inside[1]);

        let on_return = sample_fixed(&skeleton, 16.0);
        let negative = sample_fixed(&skeleton, -4.0);
        assert_approx(negative[0], on_return[0]);
        assert_approx(negative[1], on_return[1]);
        assert_approx_eps(on_return[0], 4.0, 1.0e-2);
        assert_approx_eps(on_return[2].abs(), std::f32::consts::PI, 1.0e-2);
    }
}

#[test]
fn open_path_extrapolates_before_start_and_after_end() {
    for constant_speed in [true, false] {
        let skeleton = skeleton_with_path(straight_open_path(constant_speed));

        let before = sample_fixed(&skeleton, -3.0);
        assert_approx(before[0], -3.0);
        assert_approx(before[1], 0.0);
        assert_approx(before[2], 0.0);

        let after = sample_fixed(&skeleton, 13.0);
        assert_approx(after[0], 13.0);
        assert_approx(after[1], 0.0);
        assert_approx(after[2], 0.0);
    }
}

#[test]
fn open_path_extrapolates_along_the_end_tangents() {
    use std::f32::consts::FRAC_PI_2;
    for constant_speed in [true, false] {
        let skeleton = skeleton_with_path(arch_path(constant_speed));
        let path_length = arch_length(&skeleton, constant_speed);

        // The arch leaves (0, 0) heading +y and arrives at (10, 0) heading -y.
        let before = sample_fixed(&skeleton, -3.0);
        assert_approx(before[0], 0.0);
        assert_approx(before[1], -3.0);
        assert_approx(before[2], FRAC_PI_2);

        let after = sample_fixed(&skeleton, path_length + 3.0);
        assert_approx(after[0], 10.0);
        assert_approx(after[1], -3.0);
        assert_approx(after[2], -FRAC_PI_2);
    }
}

#[test]
fn backward_samples_return_to_earlier_curves() {
    for constant_speed in [true, false] {
        let skeleton = skeleton_with_path(two_curve_line(constant_speed));
        let out = sample(
            &skeleton,
            PositionMode::Fixed,
            SpacingMode::Fixed,
            &[0.0, -10.0, 12.0],
            false,
            15.0,
        );
        assert_approx_eps(out[0], 15.0, 1.0e-2);
        assert_approx_eps(out[3], 5.0, 1.0e-2);
        assert_approx_eps(out[6], 17.0, 1.0e-2);
        assert!(out.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn backward_samples_within_one_curve() {
    for constant_speed in [true, false] {
        let skeleton = skeleton_with_path(straight_open_path(constant_speed));
        let out = sample(
            &skeleton,
            PositionMode::Fixed,
            SpacingMode::Fixed,
            &[0.0, 6.0, -4.0],
            false,
            1.0,
        );
        assert_approx_eps(out[0], 1.0, 1.0e-2);
        assert_approx_eps(out[3], 7.0, 1.0e-2);
        assert_approx_eps(out[6], 3.0, 1.0e-2);
    }
}

#[test]
fn negative_gap_is_not_a_shared_point() {
    let skeleton = skeleton_with_path(arch_path(false));
    let out = sample(
        &skeleton,
        PositionMode::Fixed,
        SpacingMode::Fixed,
        &[0.0, -2.0],
        false,
        10.0,
    );
    // Only a zero gap stores the tangent; the angle slot stays empty otherwise.
    assert_eq!(out[5], 0.0);
}

#[test]
fn percent_position_matches_fixed_position_times_length() {
    for constant_speed in [true, false] {
        let skeleton = skeleton_with_path(arch_path(constant_speed));
        let path_length = arch_length(&skeleton, constant_speed);

        let percent = sample(
            &skeleton,
            PositionMode::Percent,
            SpacingMode::Fixed,
            &[0.0],
            true,
            0.3,
        );
        let fixed = sample(
            &skeleton,
            PositionMode::Fixed,
            SpacingMode::Fixed,
            &[0.0],
            true,
            0.3 * path_length,
        );
        assert_approx(percent[0], fixed[0]);
        assert_approx(percent[1], fixed[1]);
        assert_approx(percent[2], fixed[2]);
    }
}

#[test]
fn spaces_accumulate_along_the_path() {
    let skeleton = skeleton_with_path(straight_open_path(false));
    let out = sample(
        &skeleton,
        PositionMode::Fixed,
        SpacingMode::Fixed,
        &[0.0, 2.0, 3.0],
        false,
        1.0,
    );
    assert_eq!(out.len(), 3 * 3 + 2);
    assert_approx(out[0], 1.0);
    assert_approx(out[3], 3.0);
    assert_approx(out[6], 6.0);
}

#[test]
fn percent_spacing_scales_spaces_by_path_length() {
    let skeleton = skeleton_with_path(straight_open_path(false));
    let out = sample(
        &skeleton,
        PositionMode::Percent,
        SpacingMode::Percent,
        &[0.0, 0.25, 0.25],
        false,
        0.25,
    );
    assert_approx(out[0], 2.5);
    assert_approx(out[3], 5.0);
    assert_approx(out[6], 7.5);
}

#[test]
fn zero_gap_samples_carry_the_tangent() {
    let skeleton = skeleton_with_path(arch_path(true));
    let out = sample(
        &skeleton,
        PositionMode::Fixed,
        SpacingMode::Fixed,
        &[0.0, 0.0],
        false,
        0.0,
    );
    // Both samples sit on the first point; the second reports the start direction.
    assert_approx(out[3], 0.0);
    assert_approx(out[4], 0.0);
    assert_approx(out[5], std::f32::consts::FRAC_PI_2);
}

#[test]
fn curve_endpoints_are_exact() {
    let points = [0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 10.0, 0.0];
    let mut out = [0.0f32; 3];

    add_curve_position(0.0, points, &mut out, 0, true);
    assert_eq!(out[0], 0.0);
    assert_eq!(out[1], 0.0);
    assert_approx(out[2], std::f32::consts::FRAC_PI_2);

    add_curve_position(1.0, points, &mut out, 0, true);
    assert_approx_eps(out[0], 10.0, 1.0e-6);
    assert_approx_eps(out[1], 0.0, 1.0e-6);
    assert_approx(out[2], -std::f32::consts::FRAC_PI_2);
}

#[test]
fn nan_parameter_falls_back_to_first_point() {
    let points = [1.0, 2.0, 4.0, 2.0, 6.0, 2.0, 9.0, 2.0];
    let mut out = [7.0f32; 3];
    add_curve_position(f32::NAN, points, &mut out, 0, false);
    assert_eq!(out, [1.0, 2.0, 0.0]);
}

#[test]
fn segment_table_ends_at_total_length() {
    let points = [0.0, 0.0, 3.333_333_3, 0.0, 6.666_666_5, 0.0, 10.0, 0.0];
    let mut segments = [0.0f32; 10];
    let total = measure_curve_segments(points, &mut segments);
    assert_approx(total, 10.0);
    assert_eq!(segments[9], total);
    assert!(segments.windows(2).all(|w| w[0] <= w[1]));
    assert_approx(estimate_curve_length(points), 10.0);
}

#[test]
fn constant_speed_agrees_with_precomputed_on_uniform_line() {
    let constant = skeleton_with_path(straight_open_path(true));
    let precomputed = skeleton_with_path(straight_open_path(false));
    for position in [0.5, 2.0, 5.0, 7.25, 9.5] {
        let a = sample_fixed(&constant, position);
        let b = sample_fixed(&precomputed, position);
        assert_approx_eps(a[0], b[0], 1.0e-2);
        assert_approx_eps(a[1], b[1], 1.0e-2);
        assert_approx_eps(a[2], b[2], 1.0e-2);
    }
}

#[test]
fn constant_speed_agrees_with_precomputed_at_symmetric_midpoint() {
    let constant = skeleton_with_path(arch_path(true));
    let precomputed = skeleton_with_path(arch_path(false));
    let a = sample(
        &constant,
        PositionMode::Percent,
        SpacingMode::Fixed,
        &[0.0],
        true,
        0.5,
    );
    let b = sample(
        &precomputed,
        PositionMode::Percent,
        SpacingMode::Fixed,
        &[0.0],
        true,
        0.5,
    );
    assert_approx_eps(a[0], 5.0, 1.0e-2);
    assert_approx_eps(a[1], 7.5, 1.0e-2);
    assert_approx_eps(a[0], b[0], 1.0e-2);
    assert_approx_eps(a[1], b[1], 1.0e-2);
    assert_approx_eps(a[2], b[2], 1.0e-2);
}

#[test]
fn too_few_vertices_yield_no_samples() {
    let mut path = straight_open_path(true);
    path.vertices = MeshVertices::Unweighted(vec![[0.0, 0.0], [1.0, 0.0]]);
    let skeleton = skeleton_with_path(path);
    let out = sample(
        &skeleton,
        PositionMode::Fixed,
        SpacingMode::Fixed,
        &[0.0],
        false,
        0.0,
    );
    assert!(out.is_empty());
}

#[test]
fn missing_precomputed_lengths_yield_no_samples() {
    let mut path = straight_open_path(false);
    path.lengths.clear();
    let skeleton = skeleton_with_path(path);
    let out = sample(
        &skeleton,
        PositionMode::Fixed,
        SpacingMode::Fixed,
        &[0.0],
        false,
        0.0,
    );
    assert!(out.is_empty());
}
