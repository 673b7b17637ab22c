//! Loading and packing frame sources.
//!
//! A source is either a directory of images (played in file name order) or a
//! `.bin` file holding frames already packed back to back.

use std::fs;
use std::path::{Path, PathBuf};

use frame_protocol::{pack_image, Frame, FrameError, FRAME_BYTES};
use thiserror::Error;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{} is {len} bytes, not a whole number of {}-byte frames", .path.display(), FRAME_BYTES)]
    Truncated { path: PathBuf, len: usize },

    #[error("no images found in {}", .0.display())]
    Empty(PathBuf),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub fn load_image(path: &Path) -> Result<Frame, FrameSourceError> {
    let image = image::open(path).map_err(|source| FrameSourceError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(pack_image(&image)?)
}

/// Image files directly inside `dir`, sorted by name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, FrameSourceError> {
    let io_err = |source| FrameSourceError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_image(&path) {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(FrameSourceError::Empty(dir.to_path_buf()));
    }
    paths.sort();
    Ok(paths)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Load every frame of a source. `on_frame(done, total)` is called after each
/// image is packed so the caller can report progress.
pub fn load_source(
    path: &Path,
    mut on_frame: impl FnMut(usize, usize),
) -> Result<Vec<Frame>, FrameSourceError> {
    if path.is_dir() {
        let paths = list_images(path)?;
        let total = paths.len();
        let mut frames = Vec::with_capacity(total);
        for (i, image_path) in paths.iter().enumerate() {
            frames.push(load_image(image_path)?);
            on_frame(i + 1, total);
        }
        Ok(frames)
    } else if is_image(path) {
        let frame = load_image(path)?;
        on_frame(1, 1);
        Ok(vec![frame])
    } else {
        let frames = read_frame_file(path)?;
        on_frame(frames.len(), frames.len());
        Ok(frames)
    }
}

/// Read a file of concatenated packed frames
pub fn read_frame_file(path: &Path) -> Result<Vec<Frame>, FrameSourceError> {
    let data = fs::read(path).map_err(|source| FrameSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if data.is_empty() || data.len() % FRAME_BYTES != 0 {
        return Err(FrameSourceError::Truncated {
            path: path.to_path_buf(),
            len: data.len(),
        });
    }

    data.chunks_exact(FRAME_BYTES)
        .map(|chunk| Frame::from_bytes(chunk).map_err(FrameSourceError::from))
        .collect()
}

pub fn write_frame_file(path: &Path, frames: &[Frame]) -> Result<(), FrameSourceError> {
    let mut data = Vec::with_capacity(frames.len() * FRAME_BYTES);
    for frame in frames {
        data.extend_from_slice(frame.as_bytes());
    }
    fs::write(path, data).map_err(|source| FrameSourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_protocol::{FRAME_HEIGHT, FRAME_WIDTH};
    use image::{DynamicImage, GrayImage, Luma};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("frame-streamer-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_pack_full_size_image() {
        // Left half bright, right half dark
        let gray = GrayImage::from_fn(FRAME_WIDTH as u32, FRAME_HEIGHT as u32, |x, _| {
            if (x as usize) < FRAME_WIDTH / 2 {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let frame = pack_image(&DynamicImage::ImageLuma8(gray)).unwrap();

        for y in 0..FRAME_HEIGHT {
            assert_eq!(&frame.row(y)[..8], &[0xFF; 8]);
            assert_eq!(&frame.row(y)[8..], &[0x00; 8]);
        }
    }

    #[test]
    fn test_pack_threshold_is_strict() {
        let at = GrayImage::from_pixel(FRAME_WIDTH as u32, FRAME_HEIGHT as u32, Luma([128]));
        let above = GrayImage::from_pixel(FRAME_WIDTH as u32, FRAME_HEIGHT as u32, Luma([129]));

        assert_eq!(pack_image(&DynamicImage::ImageLuma8(at)).unwrap(), Frame::new());
        assert_eq!(
            pack_image(&DynamicImage::ImageLuma8(above)).unwrap(),
            Frame::filled(true)
        );
    }

    #[test]
    fn test_pack_rescales_any_size() {
        let gray = GrayImage::from_pixel(320, 240, Luma([200]));
        let frame = pack_image(&DynamicImage::ImageLuma8(gray)).unwrap();
        assert_eq!(frame, Frame::filled(true));
    }

    #[test]
    fn test_loaded_image_uses_shared_packer() {
        let dir = scratch_dir("shared");
        let path = dir.join("gradient.png");
        GrayImage::from_fn(200, 150, |x, y| Luma([((x + y) % 256) as u8]))
            .save(&path)
            .unwrap();

        let expected = pack_image(&image::open(&path).unwrap()).unwrap();
        assert_eq!(load_image(&path).unwrap(), expected);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_directory_source_is_sorted() {
        let dir = scratch_dir("sorted");
        // Written out of order: dark second, bright first
        GrayImage::from_pixel(16, 12, Luma([0]))
            .save(dir.join("frame_002.png"))
            .unwrap();
        GrayImage::from_pixel(16, 12, Luma([255]))
            .save(dir.join("frame_001.png"))
            .unwrap();
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut calls = Vec::new();
        let frames = load_source(&dir, |done, total| calls.push((done, total))).unwrap();

        assert_eq!(frames, vec![Frame::filled(true), Frame::new()]);
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = scratch_dir("empty");
        assert!(matches!(list_images(&dir), Err(FrameSourceError::Empty(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_frame_file_written_and_read_back() {
        let dir = scratch_dir("bin");
        let path = dir.join("clip.bin");
        let mut checker = Frame::new();
        checker.set_pixel(0, 0, true);
        checker.set_pixel(FRAME_WIDTH - 1, FRAME_HEIGHT - 1, true);
        let frames = vec![Frame::filled(true), checker];

        write_frame_file(&path, &frames).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 2 * FRAME_BYTES as u64);
        assert_eq!(load_source(&path, |_, _| {}).unwrap(), frames);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_partial_frame_file_is_rejected() {
        let dir = scratch_dir("partial");
        let path = dir.join("short.bin");
        fs::write(&path, vec![0u8; FRAME_BYTES + 10]).unwrap();

        match read_frame_file(&path) {
            Err(FrameSourceError::Truncated { len, .. }) => assert_eq!(len, FRAME_BYTES + 10),
            other => panic!("expected truncation error, got {:?}", other),
        }

        fs::write(&path, b"").unwrap();
        assert!(matches!(
            read_frame_file(&path),
            Err(FrameSourceError::Truncated { len: 0, .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
