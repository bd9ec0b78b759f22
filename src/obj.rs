use anyhow::{anyhow, Context, Result};
use glam::Vec3;

use crate::error::ShadowError;
use crate::mesh::Mesh;

/// Parses a Wavefront OBJ file from memory into a position-only [`Mesh`].
///
/// Only `v` and `f` records are read. Polygons are fan-triangulated and
/// texture/normal references in face records are ignored.
pub fn load_obj_from_str(name: &str, data: &str) -> Result<Mesh> {
    let mut positions = Vec::new();
    let mut polygons: Vec<Vec<i64>> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "f" => polygons.push(
                parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?,
            ),
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let mut indices = Vec::with_capacity(polygons.len() * 3);
    for polygon in &polygons {
        let resolved = polygon
            .iter()
            .map(|&index| {
                fix_index(index, positions.len()).ok_or_else(|| {
                    ShadowError::mesh(name, format!("face references missing vertex {index}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        for i in 1..resolved.len() - 1 {
            indices.extend_from_slice(&[resolved[0], resolved[i], resolved[i + 1]]);
        }
    }

    Ok(Mesh::new(name, positions, indices)?)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    let x = component()?;
    let y = component()?;
    let z = component()?;
    Ok(Vec3::new(x, y, z))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<i64>> {
    let mut indices = Vec::new();
    for part in parts {
        let vertex = part
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i64>()?;
        indices.push(vertex);
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

/// Converts a one-based (or negative, relative) OBJ index to a zero-based one.
fn fix_index(index: i64, len: usize) -> Option<u32> {
    let zero_based = if index > 0 {
        let zero_based = (index - 1) as usize;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let back = index.unsigned_abs() as usize;
        (back <= len).then(|| len - back)
    } else {
        None
    }?;
    u32::try_from(zero_based).ok()
}
