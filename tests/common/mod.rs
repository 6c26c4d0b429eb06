#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Distinct bytes per image so copies can be compared against sources.
pub fn image_bytes(name: &str) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(name.as_bytes());
    bytes
}

/// Populate `dir` with `img_00.jpg` .. and a label for every index in
/// `labelled`. Returns the image file names.
pub fn write_source_folder(dir: &Path, count: usize, labelled: &[usize]) -> Vec<String> {
    fs::create_dir_all(dir).expect("create source dir");

    (0..count)
        .map(|i| {
            let name = format!("img_{i:02}.jpg");
            fs::write(dir.join(&name), image_bytes(&name)).expect("write image");
            if labelled.contains(&i) {
                fs::write(
                    dir.join(format!("img_{i:02}.txt")),
                    format!("0 0.5 0.5 0.{i} 0.{i}\n"),
                )
                .expect("write label");
            }
            name
        })
        .collect()
}

pub fn write_classes(dir: &Path, names: &[&str]) {
    fs::write(dir.join("classes.txt"), names.join("\n")).expect("write classes.txt");
}

/// File names directly inside `dir`, sorted.
pub fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn write_png(path: &Path, width: u32, height: u32) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    image::RgbImage::from_pixel(width, height, image::Rgb([40, 80, 120]))
        .save(path)
        .expect("write png");
    path.to_path_buf()
}
