//! Wavefront OBJ export.
//!
//! Writes the shared positions (`v`) once, then per section its vertex
//! instance normals (`vn`) and UVs (`vt`) and the faces (`f`) referencing
//! all three. Each section becomes an `o patch_<id>` object with a
//! `usemtl slot_<rrggbb>` line so material slots survive the dump.

use crate::tessellate::MeshRecord;
use std::io::{self, Write};

/// Write a `MeshRecord` as Wavefront OBJ text to the given writer.
pub fn write_obj<W: Write>(mesh: &MeshRecord, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "# brepweld OBJ export")?;
    writeln!(
        writer,
        "# Vertices: {}, Triangles: {}, Sections: {}",
        mesh.vertex_count(),
        mesh.triangle_count(),
        mesh.sections.len()
    )?;

    for p in &mesh.positions {
        writeln!(writer, "v {:.6} {:.6} {:.6}", p[0], p[1], p[2])?;
    }

    // OBJ indices are 1-based and global across the file.
    let mut attribute_base = 1;
    for section in &mesh.sections {
        writeln!(writer, "o patch_{}", section.patch_id)?;
        writeln!(writer, "usemtl slot_{:06x}", section.material_slot)?;
        for n in &section.normals {
            writeln!(writer, "vn {:.6} {:.6} {:.6}", n[0], n[1], n[2])?;
        }
        for uv in &section.uvs {
            writeln!(writer, "vt {:.6} {:.6}", uv[0], uv[1])?;
        }
        for tri in &section.triangles {
            write!(writer, "f")?;
            for &corner in tri {
                let v = section.vertex_positions[corner as usize] + 1;
                let a = attribute_base + corner;
                write!(writer, " {v}/{a}/{a}")?;
            }
            writeln!(writer)?;
        }
        attribute_base += section.vertex_positions.len() as u32;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tessellate::MeshSection;

    fn quad() -> MeshRecord {
        let section = MeshSection {
            patch_id: 3,
            material_slot: 0x00ff_8000,
            vertex_positions: vec![0, 1, 2, 3],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
        };
        MeshRecord {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            sections: vec![section],
        }
    }

    #[test]
    fn obj_contains_vertices_and_faces() {
        let mut mesh = quad();
        mesh.append(quad());
        let mut buf = Vec::new();
        write_obj(&mesh, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let count = |prefix: &str| text.lines().filter(|l| l.starts_with(prefix)).count();
        assert_eq!(count("v "), 8);
        assert_eq!(count("vn "), 8);
        assert_eq!(count("vt "), 8);
        assert_eq!(count("f "), 4);
        assert_eq!(count("o patch_3"), 2);
        assert!(text.contains("usemtl slot_ff8000"));
    }

    #[test]
    fn second_section_indices_are_offset() {
        let mut mesh = quad();
        mesh.append(quad());
        let mut buf = Vec::new();
        write_obj(&mesh, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let last = text.lines().filter(|l| l.starts_with("f ")).last().unwrap();
        assert_eq!(last, "f 5/5/5 7/7/7 8/8/8");
        for line in text.lines().filter(|l| l.starts_with("f ")) {
            for part in line.split_whitespace().skip(1) {
                let idx: u32 = part.split('/').next().unwrap().parse().unwrap();
                assert!(idx >= 1, "OBJ indices must be 1-based, got {idx}");
            }
        }
    }
}
