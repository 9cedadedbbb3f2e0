//! Light Geometry Tests
//!
//! Tests for:
//! - Point light bounding cube (six inward planes at shadow.far)
//! - Directional light frustum planes (Gribb-Hartmann, 0..1 depth)
//! - LightGeometry caching and recompute on light movement
//! - Lights without shadows are rejected

use glam::Vec3;

use myth_godrays::errors::GodraysError;
use myth_godrays::renderer::graph::light_geometry::{ClipPlanes, LightGeometry, Plane, ShadowVolume};
use myth_godrays::scene::light::LightSource;

const EPSILON: f32 = 1e-4;

fn assert_normalized(planes: &ClipPlanes) {
    for plane in planes.iter() {
        assert!(
            (plane.normal.length() - 1.0).abs() < EPSILON,
            "plane normal {} is not unit length",
            plane.normal
        );
    }
}

// ============================================================================
// Planes
// ============================================================================

#[test]
fn plane_from_equation_is_normalized() {
    let plane = Plane::from_equation(glam::Vec4::new(0.0, 2.0, 0.0, -4.0));
    assert!((plane.normal - Vec3::Y).length() < EPSILON);
    assert!((plane.constant + 2.0).abs() < EPSILON);
    assert!(plane.distance_to_point(Vec3::new(0.0, 3.0, 0.0)) > 0.0);
    assert!(plane.distance_to_point(Vec3::new(0.0, 1.0, 0.0)) < 0.0);
}

// ============================================================================
// Point light
// ============================================================================

#[test]
fn point_light_bounds_a_cube_of_shadow_far() {
    let position = Vec3::new(1.0, 2.0, 3.0);
    let light = LightSource::point(position, 0.1, 10.0);
    let mut geometry = LightGeometry::new();
    geometry.update(&light).unwrap();

    let planes = geometry.planes();
    assert_normalized(planes);
    assert!(planes.contains(position));

    for axis in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
        assert!(planes.contains(position + axis * 9.9), "inside along {axis}");
        assert!(!planes.contains(position + axis * 10.1), "outside along {axis}");
    }
}

#[test]
fn point_light_normals_face_the_light() {
    let position = Vec3::new(-4.0, 0.5, 2.0);
    let light = LightSource::point(position, 0.1, 25.0);
    let mut planes = ClipPlanes::default();
    light
        .kind
        .write_clip_planes(position, &light.shadow.as_ref().unwrap().camera, &mut planes);

    for plane in planes.iter() {
        assert!((plane.distance_to_point(position) - 25.0).abs() < EPSILON);
    }
}

// ============================================================================
// Directional light
// ============================================================================

#[test]
fn directional_light_bounds_its_shadow_frustum() {
    let light = LightSource::directional(Vec3::new(0.0, 50.0, 0.0), Vec3::ZERO, 20.0, 1.0, 100.0);
    let mut geometry = LightGeometry::new();
    geometry.update(&light).unwrap();

    let planes = geometry.planes();
    assert_normalized(planes);

    // inside: within the 40x40 footprint and between near (y = 49) and far (y = -50)
    assert!(planes.contains(Vec3::ZERO));
    assert!(planes.contains(Vec3::new(19.0, -40.0, -19.0)));
    assert!(planes.contains(Vec3::new(0.0, 48.0, 0.0)));

    assert!(!planes.contains(Vec3::new(21.0, 0.0, 0.0)));
    assert!(!planes.contains(Vec3::new(0.0, 0.0, -21.0)));
    assert!(!planes.contains(Vec3::new(0.0, 49.5, 0.0)));
    assert!(!planes.contains(Vec3::new(0.0, -51.0, 0.0)));
}

#[test]
fn directional_light_matrix_is_shadow_view_projection() {
    let light = LightSource::directional(Vec3::new(10.0, 30.0, 5.0), Vec3::ZERO, 15.0, 0.5, 80.0);
    let mut geometry = LightGeometry::new();
    geometry.update(&light).unwrap();

    let expected = light.shadow.as_ref().unwrap().camera.view_projection();
    assert!(geometry.light_space_matrix().abs_diff_eq(expected, EPSILON));
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn geometry_recomputes_only_when_light_changes() {
    let mut light = LightSource::point(Vec3::ZERO, 0.1, 10.0);
    let mut geometry = LightGeometry::new();

    assert!(geometry.update(&light).unwrap());
    assert!(!geometry.update(&light).unwrap());
    assert!(!geometry.update(&light).unwrap());
    assert_eq!(geometry.recompute_count(), 1);

    light.set_position(Vec3::new(0.0, 5.0, 0.0));
    assert!(geometry.update(&light).unwrap());
    assert_eq!(geometry.recompute_count(), 2);
    assert!(geometry.planes().contains(Vec3::new(0.0, 14.0, 0.0)));
    assert!(!geometry.planes().contains(Vec3::new(0.0, -6.0, 0.0)));
}

#[test]
fn light_without_shadow_is_rejected() {
    let light = LightSource::point(Vec3::ZERO, 0.1, 10.0).without_shadow();
    let mut geometry = LightGeometry::new();
    let err = geometry.update(&light).unwrap_err();
    assert!(matches!(err, GodraysError::LightWithoutShadow));
}

#[test]
fn plane_uniform_packs_normal_and_constant() {
    let light = LightSource::point(Vec3::ZERO, 0.1, 10.0);
    let mut geometry = LightGeometry::new();
    geometry.update(&light).unwrap();

    let uniform = geometry.planes().to_uniform();
    for (packed, plane) in uniform.0.iter().zip(geometry.planes().iter()) {
        assert_eq!(packed.truncate(), plane.normal);
        assert_eq!(packed.w, plane.constant);
    }
}
