use std::path::PathBuf;

use futures::future::BoxFuture;
use slideshow_cache::{DecodeError, Decoded, Decoder};

use crate::discovery::is_image_path;

/// The raw contents of an image file.
#[derive(Debug)]
pub struct ImageFile {
    /// Where the file was read from.
    pub path: PathBuf,
    /// The file contents.
    pub data: Vec<u8>,
}

/// A [`Decoder`] that reads image files into memory without decoding their pixels.
///
/// The memory footprint of an item is the size of the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl Decoder for FileDecoder {
    type Item = ImageFile;

    fn decode(
        &self,
        _position: usize,
        path: PathBuf,
    ) -> BoxFuture<'static, Result<Decoded<ImageFile>, DecodeError>> {
        Box::pin(async move {
            if !is_image_path(&path) {
                return Err(DecodeError::Unsupported(path.display().to_string()));
            }

            let data = tokio::fs::read(&path).await?;
            if data.is_empty() {
                return Err(DecodeError::Malformed(format!(
                    "{} is empty",
                    path.display()
                )));
            }

            let bytes = data.len() as u64;
            Ok(Decoded {
                item: ImageFile { path, data },
                bytes,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use slideshow_test as test;

    use super::*;

    #[tokio::test]
    async fn test_reads_file() {
        test::setup();
        let dir = test::tempdir();
        let path = dir.path().join("image.png");
        fs::write(&path, b"not really a png").unwrap();

        let decoded = FileDecoder.decode(0, path.clone()).await.unwrap();
        assert_eq!(decoded.bytes, 16);
        assert_eq!(decoded.item.path, path);
        assert_eq!(decoded.item.data, b"not really a png");
    }

    #[tokio::test]
    async fn test_failures() {
        test::setup();
        let dir = test::tempdir();

        let empty = dir.path().join("empty.jpg");
        fs::write(&empty, b"").unwrap();
        let error = FileDecoder.decode(0, empty).await.unwrap_err();
        assert!(matches!(error, DecodeError::Malformed(_)));

        let missing = dir.path().join("missing.jpg");
        let error = FileDecoder.decode(1, missing).await.unwrap_err();
        assert!(matches!(error, DecodeError::Io(_)));

        let text = dir.path().join("notes.txt");
        fs::write(&text, b"hello").unwrap();
        let error = FileDecoder.decode(2, text).await.unwrap_err();
        assert!(matches!(error, DecodeError::Unsupported(_)));
    }
}
