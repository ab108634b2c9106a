use crate::subdivide::{CutRule, Subdivider, VertexPool};
use crate::surface::texture_extents;
use crate::ConvertOptions;
use bsp::error::{narrow, BspError, BspResult};
use bsp::pc::{Face, PcBsp};
use bsp::types::{Edge, Point3F, VertexIndex};
use itertools::Itertools;
use std::collections::HashMap;
use std::ops::Range;

/// Splits liquid faces whose lightmap extents are too large for the PC
/// engine and relinks every face range. Returns the number of faces split.
pub fn fix_liquids(pc: &mut PcBsp, options: &ConvertOptions) -> BspResult<usize> {
    let subdivider =
        Subdivider::new(Subdivider::world_axes(), options.liquid_step, CutRule::FromMin)
            .with_epsilon(options.epsilon);

    let old_faces = std::mem::take(&mut pc.faces);
    let mut faces = Vec::with_capacity(old_faces.len());
    let mut remap: Vec<Range<usize>> = Vec::with_capacity(old_faces.len());
    let mut split = 0;

    for (index, face) in old_faces.iter().enumerate() {
        let start = faces.len();
        let corners = pc.face_vertices(face);
        let points: Vec<Point3F> = corners.iter().map(|v| pc.vertices[v.index()]).collect();

        if is_oversized_liquid(pc, face, &points, options)? {
            let pieces = subdivider.subdivide(&points);
            if pieces.len() > 1 {
                trace!("liquid face {} split into {} pieces", index, pieces.len());
                append_pieces(pc, face, &corners, &pieces, options.epsilon, &mut faces)?;
                split += 1;
            } else {
                faces.push(*face);
            }
        } else {
            faces.push(*face);
        }
        remap.push(start..faces.len());
    }

    pc.faces = faces;
    if split > 0 {
        relink(pc, &remap)?;
    }
    Ok(split)
}

fn is_oversized_liquid(
    pc: &PcBsp,
    face: &Face,
    points: &[Point3F],
    options: &ConvertOptions,
) -> BspResult<bool> {
    let liquid = pc
        .face_texture(face)
        .map_or(false, |texture| texture.is_liquid());
    if !liquid {
        return Ok(false);
    }
    let projection = &pc.texinfo[face.texinfo.index()].projection;
    let (_, extents) = texture_extents(points, projection)?;
    Ok(extents
        .iter()
        .any(|extent| *extent as i64 > options.max_liquid_extent as i64))
}

/// Appends one face per piece, sharing vertices with the original corners
/// and edges between pieces of the same face.
fn append_pieces(
    pc: &mut PcBsp,
    face: &Face,
    corners: &[VertexIndex],
    pieces: &[Vec<Point3F>],
    epsilon: f32,
    faces: &mut Vec<Face>,
) -> BspResult<()> {
    let seed = corners.iter().map(|v| pc.vertices[v.index()]).collect();
    let mut pool = VertexPool::seeded(seed, epsilon);
    let mut vertices: Vec<VertexIndex> = corners.to_vec();
    let mut edges: HashMap<(VertexIndex, VertexIndex), usize> = HashMap::new();

    if pc.edges.is_empty() {
        // Edge 0 can't be referenced backwards.
        pc.edges.push(Edge { vertices: [0, 0] });
    }

    for piece in pieces {
        let indices = match pool.add_loop(piece) {
            Some(indices) => indices,
            None => continue,
        };
        for position in &pool.positions()[vertices.len()..] {
            let vertex = narrow::<u16>(pc.vertices.len(), "vertices", u16::MAX as usize)?;
            vertices.push(VertexIndex::from_raw(vertex as u32));
            pc.vertices.push(*position);
        }

        let first_edge = pc.surfedges.len();
        let winding: Vec<VertexIndex> = indices.iter().map(|index| vertices[*index]).collect();
        for (a, b) in winding.iter().copied().circular_tuple_windows() {
            let surfedge = match edges.get(&(b, a)) {
                Some(edge) => -narrow::<i32>(*edge, "edges", i32::MAX as usize)?,
                None => {
                    let edge = pc.edges.len();
                    pc.edges.push(Edge::new(a, b));
                    edges.insert((a, b), edge);
                    narrow::<i32>(edge, "edges", i32::MAX as usize)?
                }
            };
            pc.surfedges.push(surfedge);
        }

        faces.push(Face {
            first_edge: narrow(first_edge, "surfedges", u32::MAX as usize)?,
            num_edges: narrow(winding.len(), "face edges", u16::MAX as usize)?,
            lighting: None,
            ..*face
        });
    }
    Ok(())
}

/// New `(first, count)` of a face range after each old face became the
/// faces in `remap[old]`.
fn remap_range(remap: &[Range<usize>], first: usize, count: usize, total: usize) -> (usize, usize) {
    let start = remap.get(first).map_or(total, |range| range.start);
    if count == 0 {
        return (start, 0);
    }
    let end = remap
        .get(first + count - 1)
        .map_or(total, |range| range.end);
    (start, end.saturating_sub(start))
}

fn relink(pc: &mut PcBsp, remap: &[Range<usize>]) -> BspResult<()> {
    let total = pc.faces.len();

    for node in &mut pc.nodes {
        let (first, count) =
            remap_range(remap, node.first_face as usize, node.num_faces as usize, total);
        node.first_face = narrow(first, "faces", u16::MAX as usize)?;
        node.num_faces = narrow(count, "faces", u16::MAX as usize)?;
    }
    for model in &mut pc.models {
        let first = usize::try_from(model.first_face).unwrap_or(0);
        let count = usize::try_from(model.num_faces).unwrap_or(0);
        let (first, count) = remap_range(remap, first, count, total);
        model.first_face = narrow(first, "faces", i32::MAX as usize)?;
        model.num_faces = narrow(count, "faces", i32::MAX as usize)?;
    }

    let old = std::mem::take(&mut pc.marksurfaces);
    let mut marksurfaces = Vec::with_capacity(old.len());
    for leaf in &mut pc.leafs {
        let start = marksurfaces.len();
        let listed = old
            .iter()
            .skip(leaf.first_marksurface as usize)
            .take(leaf.num_marksurfaces as usize);
        for face in listed {
            let faces = remap.get(*face as usize).cloned().unwrap_or(0..0);
            for face in faces {
                marksurfaces.push(narrow::<u16>(face, "marksurfaces", u16::MAX as usize)?);
            }
        }
        leaf.first_marksurface = narrow(start, "marksurfaces", u16::MAX as usize)?;
        leaf.num_marksurfaces =
            narrow(marksurfaces.len() - start, "marksurfaces", u16::MAX as usize)?;
    }
    pc.marksurfaces = marksurfaces;

    if total > u16::MAX as usize + 1 {
        return Err(BspError::CapacityExceeded {
            what: "faces",
            needed: total,
            limit: u16::MAX as usize + 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ranges_follow_split_faces() {
        // Face 1 became three faces.
        let remap = vec![0..1, 1..4, 4..5, 5..6];
        assert_eq!(remap_range(&remap, 0, 2, 6), (0, 4));
        assert_eq!(remap_range(&remap, 2, 2, 6), (4, 2));
        assert_eq!(remap_range(&remap, 1, 1, 6), (1, 3));
        assert_eq!(remap_range(&remap, 3, 0, 6), (5, 0));
        assert_eq!(remap_range(&remap, 4, 0, 6), (6, 0));
    }
}
