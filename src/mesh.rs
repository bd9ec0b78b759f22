use glam::Vec3;
use serde::Serialize;

use crate::error::ShadowError;

/// Indexed triangle mesh: positions plus three indices per triangle.
///
/// A `Mesh` can only be built through [`Mesh::new`], so every instance has
/// passed index validation before it reaches a rendering device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mesh {
    name: String,
    positions: Vec<Vec3>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Validates and wraps mesh data.
    pub fn new(
        name: impl Into<String>,
        positions: Vec<Vec3>,
        indices: Vec<u32>,
    ) -> Result<Self, ShadowError> {
        let name = name.into();
        if indices.is_empty() {
            return Err(ShadowError::mesh(&name, "mesh has no triangles"));
        }
        if indices.len() % 3 != 0 {
            return Err(ShadowError::mesh(
                &name,
                format!("index count {} is not a multiple of 3", indices.len()),
            ));
        }
        let vertex_count = positions.len();
        if let Some((slot, index)) = indices
            .iter()
            .enumerate()
            .find(|&(_, &index)| index as usize >= vertex_count)
        {
            return Err(ShadowError::mesh(
                &name,
                format!("index {index} at slot {slot} is out of range for {vertex_count} vertices"),
            ));
        }
        if let Some(position) = positions.iter().find(|p| !p.is_finite()) {
            return Err(ShadowError::mesh(
                &name,
                format!("vertex {position} is not finite"),
            ));
        }
        Ok(Self {
            name,
            positions,
            indices,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterates over the triangles as position triples.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |tri| {
            [
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            ]
        })
    }

    /// Returns a copy with every position multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            name: self.name.clone(),
            positions: self.positions.iter().map(|p| *p * factor).collect(),
            indices: self.indices.clone(),
        }
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.positions.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), p| (min.min(*p), max.max(*p)),
        )
    }
}

/// Square ground plane at `y = 0` spanning `[-half_extent, half_extent]`.
pub fn floor_quad(half_extent: f32) -> Mesh {
    let h = half_extent;
    let positions = vec![
        Vec3::new(-h, 0.0, h),
        Vec3::new(h, 0.0, h),
        Vec3::new(h, 0.0, -h),
        Vec3::new(-h, 0.0, -h),
    ];
    Mesh {
        name: "floor".to_string(),
        positions,
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// Axis-aligned box centered on `center`.
pub fn cuboid(name: &str, center: Vec3, half_extents: Vec3) -> Mesh {
    let positions = [
        (-1.0, -1.0, 1.0),
        (1.0, -1.0, 1.0),
        (1.0, 1.0, 1.0),
        (-1.0, 1.0, 1.0),
        (-1.0, -1.0, -1.0),
        (1.0, -1.0, -1.0),
        (1.0, 1.0, -1.0),
        (-1.0, 1.0, -1.0),
    ]
    .into_iter()
    .map(|(x, y, z)| center + Vec3::new(x, y, z) * half_extents)
    .collect();
    let indices = vec![
        0, 1, 2, 0, 2, 3, // front
        5, 4, 7, 5, 7, 6, // back
        4, 0, 3, 4, 3, 7, // left
        1, 5, 6, 1, 6, 2, // right
        4, 5, 1, 4, 1, 0, // bottom
        3, 2, 6, 3, 6, 7, // top
    ];
    Mesh {
        name: name.to_string(),
        positions,
        indices,
    }
}

/// Supplies the static geometry of the scene at startup.
pub trait MeshSource {
    /// The receiving ground plane.
    fn floor(&self) -> Mesh;

    /// The rotating mesh that casts the interesting shadow.
    fn occluder(&self) -> Mesh;
}

/// Geometry that needs no asset files: the 60x60 floor and a box standing on it.
#[derive(Debug, Clone)]
pub struct BuiltinMeshSource {
    pub floor_half_extent: f32,
    pub box_half_extents: Vec3,
}

impl Default for BuiltinMeshSource {
    fn default() -> Self {
        Self {
            floor_half_extent: 30.0,
            box_half_extents: Vec3::new(2.0, 3.0, 2.0),
        }
    }
}

impl MeshSource for BuiltinMeshSource {
    fn floor(&self) -> Mesh {
        floor_quad(self.floor_half_extent)
    }

    fn occluder(&self) -> Mesh {
        let half = self.box_half_extents;
        cuboid("box", Vec3::new(0.0, half.y, 0.0), half)
    }
}

/// Floor quad plus an occluder loaded ahead of time from an OBJ file.
#[derive(Debug, Clone)]
pub struct ObjMeshSource {
    floor_half_extent: f32,
    occluder: Mesh,
}

impl ObjMeshSource {
    /// Scale applied to raw model coordinates, which are authored in tenths.
    pub const DEFAULT_SCALE: f32 = 0.1;

    pub fn new(occluder: Mesh, scale: f32) -> Self {
        Self {
            floor_half_extent: 30.0,
            occluder: occluder.scaled(scale),
        }
    }

    /// Reads and parses an OBJ file from disk.
    pub fn open(path: impl AsRef<std::path::Path>, scale: f32) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("occluder");
        let mesh = crate::obj::load_obj_from_str(name, &contents)
            .with_context(|| format!("failed to parse OBJ mesh {}", path.display()))?;
        Ok(Self::new(mesh, scale))
    }
}

impl MeshSource for ObjMeshSource {
    fn floor(&self) -> Mesh {
        floor_quad(self.floor_half_extent)
    }

    fn occluder(&self) -> Mesh {
        self.occluder.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_index() {
        let err = Mesh::new("tri", vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 3]).unwrap_err();
        match err {
            ShadowError::MeshValidation { mesh, reason } => {
                assert_eq!(mesh, "tri");
                assert!(reason.contains("index 3"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_partial_triangles_and_empty_meshes() {
        assert!(Mesh::new("a", vec![Vec3::ZERO, Vec3::X], vec![0, 1]).is_err());
        assert!(Mesh::new("b", vec![Vec3::ZERO], vec![]).is_err());
    }

    #[test]
    fn rejects_non_finite_positions() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::new(f32::NAN, 0.0, 0.0)];
        assert!(Mesh::new("nan", positions, vec![0, 1, 2]).is_err());
    }

    #[test]
    fn builtin_shapes_are_valid() {
        let floor = floor_quad(30.0);
        assert_eq!(floor.vertex_count(), 4);
        assert_eq!(floor.triangle_count(), 2);
        assert!(Mesh::new("floor", floor.positions().to_vec(), floor.indices().to_vec()).is_ok());

        let cube = cuboid("cube", Vec3::ZERO, Vec3::ONE);
        assert_eq!(cube.triangle_count(), 12);
        assert!(Mesh::new("cube", cube.positions().to_vec(), cube.indices().to_vec()).is_ok());
        assert_eq!(cube.bounds(), (Vec3::splat(-1.0), Vec3::ONE));
    }

    #[test]
    fn builtin_box_rests_on_floor() {
        let source = BuiltinMeshSource::default();
        let (min, max) = source.occluder().bounds();
        assert_eq!(min.y, 0.0);
        assert_eq!(max.y, 6.0);
    }

    #[test]
    fn scaled_multiplies_positions() {
        let mesh = cuboid("cube", Vec3::ZERO, Vec3::splat(10.0)).scaled(0.1);
        let (min, max) = mesh.bounds();
        assert!((min + Vec3::ONE).length() < 1e-6);
        assert!((max - Vec3::ONE).length() < 1e-6);
    }
}
