//! Image classification and texture hand-off.
//!
//! Pixel decoding is left to the [`TextureHost`]: the session allocates an
//! empty texture per usable image and later passes it the encoded bytes.

use crate::error::{IngestError, Result};
use crate::schema::Image;

/// Encoded image formats the loader hands to a texture host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    /// Guess from a path or URI extension, ignoring case.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Where an image's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// A `data:` URI decoded synchronously.
    Embedded(&'a str),
    BufferView(usize),
    External(&'a str),
}

impl<'a> ImageSource<'a> {
    pub fn of(image: &'a Image) -> Option<Self> {
        match (&image.uri, image.buffer_view) {
            (Some(uri), _) if crate::data_uri::is_data_uri(uri) => {
                Some(ImageSource::Embedded(uri))
            }
            (Some(uri), _) => Some(ImageSource::External(uri)),
            (None, Some(view)) => Some(ImageSource::BufferView(view)),
            (None, None) => None,
        }
    }
}

/// Format of a non-embedded image: its `mimeType`, or its URI extension.
pub fn classify(image: &Image) -> Option<ImageFormat> {
    match &image.mime_type {
        Some(mime) => ImageFormat::from_mime_type(mime),
        None => image.uri.as_deref().and_then(ImageFormat::from_uri),
    }
}

/// Texture name: the image's name, else `image_<index>`.
pub fn texture_name(image: &Image, index: usize) -> String {
    image
        .name
        .clone()
        .unwrap_or_else(|| format!("image_{}", index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub usize);

/// Receives decoded images. Implemented by the embedding application.
pub trait TextureHost: Send {
    /// Allocate an empty texture for `images[image_index]`.
    fn create_texture(&mut self, image_index: usize, name: &str) -> TextureHandle;

    /// Fill a texture created earlier with encoded image bytes.
    fn load_image(&mut self, texture: TextureHandle, format: ImageFormat, encoded: Vec<u8>)
        -> Result<()>;
}

/// A texture held by [`TextureStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTexture {
    pub image_index: usize,
    pub name: String,
    pub format: Option<ImageFormat>,
    pub encoded: Option<Vec<u8>>,
}

impl StoredTexture {
    pub fn is_loaded(&self) -> bool {
        self.encoded.is_some()
    }
}

/// In-memory texture host that keeps the encoded bytes.
#[derive(Debug, Clone, Default)]
pub struct TextureStore {
    textures: Vec<StoredTexture>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&StoredTexture> {
        self.textures.get(handle.0)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredTexture> {
        self.textures.iter()
    }
}

impl TextureHost for TextureStore {
    fn create_texture(&mut self, image_index: usize, name: &str) -> TextureHandle {
        self.textures.push(StoredTexture {
            image_index,
            name: name.to_string(),
            format: None,
            encoded: None,
        });
        TextureHandle(self.textures.len() - 1)
    }

    fn load_image(
        &mut self,
        texture: TextureHandle,
        format: ImageFormat,
        encoded: Vec<u8>,
    ) -> Result<()> {
        let slot = self.textures.get_mut(texture.0).ok_or_else(|| {
            IngestError::format(format!("Unknown texture handle {}", texture.0))
        })?;
        slot.format = Some(format);
        slot.encoded = Some(encoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(uri: Option<&str>, mime: Option<&str>, view: Option<usize>) -> Image {
        Image {
            name: None,
            uri: uri.map(String::from),
            mime_type: mime.map(String::from),
            buffer_view: view,
        }
    }

    #[test]
    fn test_classify_by_mime_type() {
        assert_eq!(
            classify(&image(None, Some("image/png"), Some(0))),
            Some(ImageFormat::Png)
        );
        assert_eq!(classify(&image(None, Some("image/ktx2"), Some(0))), None);
        // An explicit mime type wins over the extension.
        assert_eq!(
            classify(&image(Some("a.png"), Some("image/jpeg"), None)),
            Some(ImageFormat::Jpeg)
        );
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(
            classify(&image(Some("tex/Albedo.JPG"), None, None)),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            classify(&image(Some("a.png?v=2"), None, None)),
            Some(ImageFormat::Png)
        );
        assert_eq!(classify(&image(Some("a.webp"), None, None)), None);
        assert_eq!(classify(&image(Some("noext"), None, None)), None);
    }

    #[test]
    fn test_sources() {
        assert_eq!(
            ImageSource::of(&image(Some("data:image/png;base64,AA=="), None, None)),
            Some(ImageSource::Embedded("data:image/png;base64,AA=="))
        );
        assert_eq!(
            ImageSource::of(&image(None, Some("image/png"), Some(3))),
            Some(ImageSource::BufferView(3))
        );
        assert_eq!(
            ImageSource::of(&image(Some("a.png"), None, None)),
            Some(ImageSource::External("a.png"))
        );
        assert_eq!(ImageSource::of(&image(None, None, None)), None);
    }

    #[test]
    fn test_texture_store() {
        let mut store = TextureStore::new();
        let img = image(None, None, None);
        let handle = store.create_texture(2, &texture_name(&img, 2));
        assert_eq!(store.get(handle).unwrap().name, "image_2");
        assert!(!store.get(handle).unwrap().is_loaded());

        store.load_image(handle, ImageFormat::Png, vec![1, 2]).unwrap();
        let tex = store.get(handle).unwrap();
        assert_eq!(tex.format, Some(ImageFormat::Png));
        assert_eq!(tex.encoded.as_deref(), Some(&[1u8, 2][..]));
        assert!(store.load_image(TextureHandle(9), ImageFormat::Png, vec![]).is_err());
    }
}
