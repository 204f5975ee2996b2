use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use image::{Rgb, RgbImage};
use shadowmap_demo::scene::{load_obj, SceneError};

const OBJ: &str = "\
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
o floor
usemtl stone
f 1/1/1 2/2/1 3/3/1
o wall
usemtl plain
f 1/1/1 3/3/1 4/1/1
";

const MTL: &str = "\
newmtl stone
Kd 0.5 0.5 0.5
Ka 0.1 0.1 0.1
Ks 0 0 0
Ns 10
map_Kd textures/stone.png

newmtl plain
Kd 1 0 0
";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "shadowmap-demo-{}-{}",
        std::process::id(),
        name
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("textures")).unwrap();
    dir
}

fn write_scene(dir: &Path, with_image: bool) -> PathBuf {
    fs::write(dir.join("scene.mtl"), MTL).unwrap();
    let obj = dir.join("scene.obj");
    fs::write(&obj, OBJ).unwrap();
    if with_image {
        RgbImage::from_pixel(8, 4, Rgb([120, 110, 100]))
            .save(dir.join("textures/stone.png"))
            .unwrap();
    }
    obj
}

#[test]
fn loads_one_batch_per_object_with_materials() {
    let dir = scratch_dir("batches");
    let scene = load_obj(write_scene(&dir, true)).unwrap();

    let batches = scene.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].material.name, "stone");
    assert_eq!(batches[0].material.diffuse, Vec3::splat(0.5));
    assert_eq!(batches[0].material.shininess, 10.0);
    assert_eq!(
        batches[0].material.diffuse_texture.as_deref(),
        Some("textures/stone.png")
    );
    assert_eq!(batches[1].material.diffuse_texture, None);

    // Batches tile the index stream in order.
    assert_eq!(batches[0].range().end, batches[1].range().start);
    assert_eq!(scene.batched_index_count(), scene.indices().len());
    assert!(scene
        .indices()
        .iter()
        .all(|&i| (i as usize) < scene.vertex_count()));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn images_keep_their_source_size() {
    let dir = scratch_dir("images");
    let scene = load_obj(write_scene(&dir, true)).unwrap();

    let image = &scene.images()["textures/stone.png"];
    assert_eq!(image.dimensions(), (8, 4));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn unreadable_image_is_left_out_of_the_scene() {
    let dir = scratch_dir("missing-image");
    let scene = load_obj(write_scene(&dir, false)).unwrap();
    assert!(scene.images().is_empty());
    assert!(scene
        .batches()
        .iter()
        .any(|b| b.material.diffuse_texture.is_some()));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn bounds_enclose_every_vertex() {
    let dir = scratch_dir("bounds");
    let scene = load_obj(write_scene(&dir, true)).unwrap();
    let bounds = scene.bounds();
    for p in scene.positions() {
        assert!(p.cmpge(bounds.min).all() && p.cmple(bounds.max).all());
    }
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_file_reports_its_path() {
    let err = load_obj("no/such/scene.obj").unwrap_err();
    match err {
        SceneError::Obj { path, .. } => assert!(path.ends_with("scene.obj")),
        other => panic!("unexpected error: {other}"),
    }
}
