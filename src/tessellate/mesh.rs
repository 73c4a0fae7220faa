//! Mesh containers produced by tessellation.
//!
//! A `ModelMesh` is the point registry of one tessellation pass: every
//! `VertexMesh`, `EdgeMesh` and `FaceMesh` addresses points by id. Ids
//! grow monotonically and are never reused within a pass, which is what
//! lets faces sharing an edge share its points.

use crate::config::TessellationCriteria;
use crate::math::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// One end of an edge, keyed by the edge's serial.
pub type EdgeEnd = (u32, bool);

/// A corner point shared by the ends of every edge meeting there.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexMesh {
    pub point_id: u32,
    /// Edge ends welded into this corner; `true` is the curve's end.
    pub edge_ends: Vec<EdgeEnd>,
}

/// Discretization of one edge, in the direction of its curve.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeMesh {
    pub edge_serial: u32,
    /// Curve parameters, first and last being the domain ends.
    pub params: Vec<f64>,
    pub point_ids: Vec<u32>,
}

/// Triangulated patch of one face.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceMesh {
    /// Stable key of the face this mesh was built from.
    pub patch_id: u32,
    pub material_slot: u32,
    /// Point id of each vertex instance.
    pub point_ids: Vec<u32>,
    pub normals: Vec<Vector3>,
    pub uvs: Vec<Point2>,
    /// Vertex-instance indices, counter-clockwise seen from the outside.
    pub triangles: Vec<[u32; 3]>,
}

impl FaceMesh {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Point registry and mesh entities of one tessellation pass.
#[derive(Clone, Debug)]
pub struct ModelMesh {
    pub criteria: TessellationCriteria,
    positions: Vec<Point3>,
    pub vertex_meshes: Vec<VertexMesh>,
    pub edge_meshes: BTreeMap<u32, EdgeMesh>,
    pub face_meshes: Vec<FaceMesh>,
    corners: HashMap<EdgeEnd, u32>,
}

impl ModelMesh {
    pub fn new(criteria: TessellationCriteria) -> Self {
        Self {
            criteria,
            positions: Vec::new(),
            vertex_meshes: Vec::new(),
            edge_meshes: BTreeMap::new(),
            face_meshes: Vec::new(),
            corners: HashMap::new(),
        }
    }

    /// Register a point and return its id.
    pub fn add_point(&mut self, point: Point3) -> u32 {
        let id = self.positions.len() as u32;
        self.positions.push(point);
        id
    }

    pub fn point(&self, id: u32) -> Point3 {
        self.positions[id as usize]
    }

    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    /// Point id of a welded edge end.
    pub fn corner(&self, end: EdgeEnd) -> Option<u32> {
        self.corners.get(&end).copied()
    }

    pub(crate) fn add_corner(&mut self, point_id: u32, edge_ends: Vec<EdgeEnd>) {
        for &end in &edge_ends {
            self.corners.insert(end, point_id);
        }
        self.vertex_meshes.push(VertexMesh {
            point_id,
            edge_ends,
        });
    }

    pub(crate) fn extend_corner(&mut self, point_id: u32, end: EdgeEnd) {
        self.corners.insert(end, point_id);
        if let Some(vertex) = self.vertex_meshes.iter_mut().find(|v| v.point_id == point_id) {
            if !vertex.edge_ends.contains(&end) {
                vertex.edge_ends.push(end);
            }
        }
    }

    /// Forget the discretization and corners of every edge whose serial
    /// is not in `keep`. Point ids stay allocated.
    pub(crate) fn retain_edges(&mut self, keep: &HashSet<u32>) {
        self.edge_meshes.retain(|serial, _| keep.contains(serial));
        self.corners.retain(|end, _| keep.contains(&end.0));
        for vertex in &mut self.vertex_meshes {
            vertex.edge_ends.retain(|end| keep.contains(&end.0));
        }
        self.vertex_meshes.retain(|v| !v.edge_ends.is_empty());
    }

    pub fn face_mesh(&self, patch_id: u32) -> Option<&FaceMesh> {
        self.face_meshes.iter().find(|f| f.patch_id == patch_id)
    }

    /// Distinct points referenced by face meshes.
    pub fn vertex_count(&self) -> usize {
        let mut used = vec![false; self.positions.len()];
        for face in &self.face_meshes {
            for &id in &face.point_ids {
                used[id as usize] = true;
            }
        }
        used.into_iter().filter(|&u| u).count()
    }

    pub fn triangle_count(&self) -> usize {
        self.face_meshes.iter().map(FaceMesh::triangle_count).sum()
    }

    /// Flatten into the output record. Only points used by a face are
    /// emitted, in id order.
    pub fn to_record(&self) -> MeshRecord {
        let mut remap = vec![u32::MAX; self.positions.len()];
        for face in &self.face_meshes {
            for &id in &face.point_ids {
                remap[id as usize] = 0;
            }
        }
        let mut positions = Vec::new();
        for (id, slot) in remap.iter_mut().enumerate() {
            if *slot == 0 {
                *slot = positions.len() as u32;
                let p = self.positions[id];
                positions.push([p.x, p.y, p.z]);
            }
        }

        let sections = self
            .face_meshes
            .iter()
            .map(|face| MeshSection {
                patch_id: face.patch_id,
                material_slot: face.material_slot,
                vertex_positions: face.point_ids.iter().map(|&id| remap[id as usize]).collect(),
                normals: face.normals.iter().map(|n| [n.x, n.y, n.z]).collect(),
                uvs: face.uvs.iter().map(|uv| [uv.x, uv.y]).collect(),
                triangles: face.triangles.clone(),
            })
            .collect();

        MeshRecord {
            positions,
            sections,
        }
    }
}

/// Flat output mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshRecord {
    pub positions: Vec<[f64; 3]>,
    pub sections: Vec<MeshSection>,
}

/// The triangles of one face with their vertex instances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshSection {
    pub patch_id: u32,
    pub material_slot: u32,
    /// Index into `MeshRecord::positions` of each vertex instance.
    pub vertex_positions: Vec<u32>,
    pub normals: Vec<[f64; 3]>,
    pub uvs: Vec<[f64; 2]>,
    /// Vertex-instance indices.
    pub triangles: Vec<[u32; 3]>,
}

impl MeshRecord {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.sections.iter().map(|s| s.triangles.len()).sum()
    }

    /// Mirror image across the y = 0 plane of the sections whose patch id
    /// is in `patches`. Winding is reversed so the copy still faces
    /// outward; only the positions those sections use are carried.
    pub fn mirrored(&self, patches: &BTreeSet<u32>) -> MeshRecord {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut positions = Vec::new();
        let sections = self
            .sections
            .iter()
            .filter(|s| patches.contains(&s.patch_id))
            .map(|s| {
                let vertex_positions = s
                    .vertex_positions
                    .iter()
                    .map(|&p| {
                        let slot = &mut remap[p as usize];
                        if *slot == u32::MAX {
                            *slot = positions.len() as u32;
                            let [x, y, z] = self.positions[p as usize];
                            positions.push([x, -y, z]);
                        }
                        *slot
                    })
                    .collect();
                MeshSection {
                    patch_id: s.patch_id,
                    material_slot: s.material_slot,
                    vertex_positions,
                    normals: s.normals.iter().map(|&[x, y, z]| [x, -y, z]).collect(),
                    uvs: s.uvs.clone(),
                    triangles: s.triangles.iter().map(|&[a, b, c]| [a, c, b]).collect(),
                }
            })
            .collect();
        MeshRecord {
            positions,
            sections,
        }
    }

    /// Append another record, offsetting its position indices.
    pub fn append(&mut self, other: MeshRecord) {
        let offset = self.positions.len() as u32;
        self.positions.extend(other.positions);
        self.sections.extend(other.sections.into_iter().map(|mut s| {
            for p in &mut s.vertex_positions {
                *p += offset;
            }
            s
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> ModelMesh {
        let mut mesh = ModelMesh::new(TessellationCriteria::default());
        let unused = mesh.add_point(Point3::new(9.0, 9.0, 9.0));
        assert_eq!(unused, 0);
        let ids: Vec<u32> = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
        .into_iter()
        .map(|p| mesh.add_point(p))
        .collect();
        mesh.face_meshes.push(FaceMesh {
            patch_id: 4,
            material_slot: 7,
            point_ids: ids,
            normals: vec![Vector3::z(); 3],
            uvs: vec![Point2::origin(); 3],
            triangles: vec![[0, 1, 2]],
        });
        mesh
    }

    #[test]
    fn ids_are_sequential() {
        let mut mesh = ModelMesh::new(TessellationCriteria::default());
        let a = mesh.add_point(Point3::origin());
        let b = mesh.add_point(Point3::origin());
        assert_eq!((a, b), (0, 1));
    }

    #[test]
    fn record_drops_unused_points() {
        let mesh = triangle_mesh();
        assert_eq!(mesh.vertex_count(), 3);
        let record = mesh.to_record();
        assert_eq!(record.positions.len(), 3);
        assert_eq!(record.sections[0].vertex_positions, vec![0, 1, 2]);
        assert_eq!(record.sections[0].material_slot, 7);
    }

    #[test]
    fn append_offsets_indices() {
        let mut record = triangle_mesh().to_record();
        record.append(triangle_mesh().to_record());
        assert_eq!(record.vertex_count(), 6);
        assert_eq!(record.triangle_count(), 2);
        assert_eq!(record.sections[1].vertex_positions, vec![3, 4, 5]);
    }

    #[test]
    fn mirror_flips_y_and_winding() {
        let record = triangle_mesh().to_record();
        let mirror = record.mirrored(&BTreeSet::from([4]));
        assert_eq!(mirror.positions, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]]);
        assert_eq!(mirror.sections[0].triangles, vec![[0, 2, 1]]);
        assert_eq!(mirror.sections[0].normals[0], [0.0, 0.0, 1.0]);
        assert!(record.mirrored(&BTreeSet::from([5])).sections.is_empty());
    }
}
