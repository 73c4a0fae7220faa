//! Tests for session archives.

mod common;

use brepweld::source::LayerRecord;
use brepweld::tessellate::{KernelTessellator, Tessellator};
use brepweld::topo::{validate_model, OrientationState};
use brepweld::Session;
use common::*;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("brepweld_{}_{name}.json", std::process::id()))
}

fn layered_scene() -> Vec<brepweld::source::BodyRecord> {
    let mut body = twin_patches();
    body.layer = Some(LayerRecord {
        key: 42,
        name: "Panels".to_string(),
        visible: true,
        symmetric: true,
    });
    vec![body, cylinder_body(30.0, 10.0)]
}

#[test]
fn archive_round_trip_preserves_topology() {
    let session = sewn(&layered_scene());
    let path = temp_path("topology");
    session.save_archive(&path).unwrap();
    let restored = Session::load_archive(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let (a, b) = (session.model(), restored.model());
    assert_eq!(a.entity_count(), b.entity_count());
    assert_eq!(a.body_ids().len(), b.body_ids().len());
    assert_eq!(b.orientation, OrientationState::Resolved);
    assert_eq!(restored.tolerance(), session.tolerance());
    assert!(validate_model(b, restored.tolerance().stitching).valid);

    let patches = |m: &brepweld::topo::Model| -> Vec<(u32, brepweld::topo::Orientation)> {
        m.active_faces()
            .iter()
            .map(|(_, of)| (m.face(of.face).patch_id, of.orientation))
            .collect()
    };
    assert_eq!(patches(a), patches(b));

    let twins = b.edges.iter().filter(|(_, e)| e.twin.is_some()).count();
    assert_eq!(twins, 2);

    assert_eq!(restored.layers().len(), 1);
    let layer = &restored.layers().layers()[0];
    assert_eq!(layer.name, "Panels");
    assert!(layer.symmetric);
}

#[test]
fn restored_model_tessellates_identically() {
    let session = sewn(&layered_scene());
    let path = temp_path("mesh");
    session.save_archive(&path).unwrap();
    let restored = Session::load_archive(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let tessellator = KernelTessellator::new(session.tolerance().geometric);
    let crit = criteria(0.5, 0.0, 20.0);
    let before = tessellator.tessellate(session.model(), &crit).to_record();
    let after = tessellator.tessellate(restored.model(), &crit).to_record();
    assert_eq!(before, after);
}

#[test]
fn restored_session_keeps_counting() {
    let session = sewn(&[planar_rect(10.0, 10.0)]);
    let path = temp_path("counters");
    session.save_archive(&path).unwrap();
    let mut restored = Session::load_archive(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let mut assembler = brepweld::Assembler::new(&mut restored, 1.0);
    assembler.add_body(&planar_rect(5.0, 5.0));
    let model = restored.model();
    let mut patch_ids: Vec<u32> = model.faces.iter().map(|(_, f)| f.patch_id).collect();
    patch_ids.sort_unstable();
    assert_eq!(patch_ids, vec![0, 1]);
    let mut serials: Vec<u32> = model.edges.iter().map(|(_, e)| e.serial).collect();
    serials.sort_unstable();
    serials.dedup();
    assert_eq!(serials.len(), 8);
}

#[test]
fn missing_archive_is_an_io_error() {
    let err = Session::load_archive(temp_path("does_not_exist")).unwrap_err();
    assert!(matches!(err, brepweld::Error::Io(_)));
}
