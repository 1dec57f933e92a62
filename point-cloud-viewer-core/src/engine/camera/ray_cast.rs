use bevy::prelude::*;

/// Distance along `ray` to the nearest hit with the sphere in front of the
/// origin. An origin inside the sphere yields the exit point.
pub fn ray_sphere_distance(ray: &Ray3d, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = center - ray.origin;
    let closest_approach = to_center.dot(*ray.direction);
    let distance_squared = to_center.length_squared() - closest_approach * closest_approach;
    let radius_squared = radius * radius;

    if distance_squared > radius_squared {
        return None;
    }

    let half_chord = (radius_squared - distance_squared).sqrt();
    let entry = closest_approach - half_chord;
    let exit = closest_approach + half_chord;

    // Sphere entirely behind the ray.
    if exit < 0.0 {
        return None;
    }

    Some(if entry < 0.0 { exit } else { entry })
}

/// World-space hit point, see [`ray_sphere_distance`].
pub fn ray_sphere_intersection(ray: &Ray3d, center: Vec3, radius: f32) -> Option<Vec3> {
    ray_sphere_distance(ray, center, radius).map(|distance| ray.get_point(distance))
}
