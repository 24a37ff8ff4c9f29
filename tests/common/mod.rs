#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use filefs::FileFs;

/// A scratch image under the host temp directory, removed (with its side
/// files) when dropped.
pub struct TestImage {
    path: PathBuf,
}

impl TestImage {
    pub fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!("filefs-test-{}-{}.img", std::process::id(), tag));
        let img = Self { path };
        img.remove_all();
        FileFs::mkfs(&img.path).expect("mkfs");
        img
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn side(&self, suffix: &str) -> PathBuf {
        let mut os = self.path.as_os_str().to_os_string();
        os.push(suffix);
        PathBuf::from(os)
    }

    pub fn len(&self) -> u64 {
        fs::metadata(&self.path).expect("image metadata").len()
    }

    pub fn bytes(&self) -> Vec<u8> {
        fs::read(&self.path).expect("image bytes")
    }

    fn remove_all(&self) {
        let _ = fs::remove_file(&self.path);
        for suffix in ["-j", "-cp", "-add"] {
            let _ = fs::remove_file(self.side(suffix));
        }
    }
}

impl Drop for TestImage {
    fn drop(&mut self) {
        self.remove_all();
    }
}

pub fn mounted(tag: &str) -> (TestImage, FileFs) {
    let img = TestImage::new(tag);
    let mut fs = FileFs::new();
    fs.mount(img.path()).expect("mount");
    (img, fs)
}
