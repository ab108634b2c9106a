use crate::strip::{build_strips, MAX_POOL_SIZE};
use crate::subdivide::{CutRule, Subdivider, VertexPool};
use crate::surface::lightmap_coord;
use crate::ConvertOptions;
use bsp::error::{BspError, BspResult};
use bsp::polygon::{Polygon, PolygonVertex};
use bsp::types::{FaceIndex, Point3F, Projection};

/// Everything needed to mesh one console face.
#[derive(Debug, Clone)]
pub struct FaceMesh<'a> {
    pub points: &'a [Point3F],
    pub projection: &'a Projection,
    pub texture_mins: [i16; 2],
    pub extents: [i16; 2],
    pub texture_size: (u32, u32),
}

impl<'a> FaceMesh<'a> {
    /// Subdivides the face in texture space and strips the pieces.
    pub fn build(&self, face: FaceIndex, options: &ConvertOptions) -> BspResult<Polygon> {
        let subdivider = Subdivider::new(
            self.projection.directions().to_vec(),
            options.console_step,
            CutRule::Grid,
        )
        .with_epsilon(options.epsilon);
        let pieces = subdivider.subdivide(self.points);

        let mut pool = VertexPool::new(options.epsilon);
        let loops: Vec<Vec<usize>> = pieces
            .iter()
            .filter_map(|piece| pool.add_loop(piece))
            .collect();
        if pool.len() > MAX_POOL_SIZE {
            return Err(BspError::CapacityExceeded {
                what: "polygon vertices",
                needed: pool.len(),
                limit: MAX_POOL_SIZE,
            });
        }
        let loops: Vec<Vec<u16>> = loops
            .iter()
            .map(|indices| indices.iter().map(|index| *index as u16).collect())
            .collect();
        let strips = build_strips(&loops, pool.len(), options.strip_budget)?;

        trace!(
            "face {}: {} pieces, {} vertices, {} strips",
            face,
            pieces.len(),
            pool.len(),
            strips.len()
        );

        let vertices = pool
            .positions()
            .iter()
            .map(|position| self.vertex(*position))
            .collect();
        Ok(Polygon {
            face,
            vertices,
            strips,
        })
    }

    fn vertex(&self, position: Point3F) -> PolygonVertex {
        let s = self.projection.s_of(position);
        let t = self.projection.t_of(position);
        let (width, height) = self.texture_size;
        PolygonVertex {
            position,
            st: [s / width.max(1) as f32, t / height.max(1) as f32],
            lightmap: [
                lightmap_coord(s, self.texture_mins[0], self.extents[0]),
                lightmap_coord(t, self.texture_mins[1], self.extents[1]),
            ],
        }
    }
}
