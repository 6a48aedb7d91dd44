//! Owned file payloads and multipart assembly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Multipart field name carrying incident photos; repeated once per image.
pub const IMAGE_FIELD: &str = "images";

/// An in-memory file: bytes, declared MIME type and a filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Guesses the MIME type from the extension; unknown extensions fall back
    /// to `application/octet-stream`.
    pub fn from_path_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for_name(&file_name);
        Self::new(file_name, mime, bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

pub fn mime_for_name(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Splits a `data:<mime>;base64,<payload>` URL. A bare base64 string is
/// accepted and reported without a MIME type.
pub fn decode_data_url(value: &str) -> Result<(Option<String>, Vec<u8>), String> {
    let (mime, payload) = match value.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| "data url without payload".to_string())?;
            let mime = header.strip_suffix(";base64").ok_or_else(|| {
                format!("data url is not base64 encoded ({header})")
            })?;
            (Some(mime.to_string()).filter(|m| !m.is_empty()), payload)
        }
        None => (None, value),
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    Ok((mime, bytes))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingImage {
    pub file: ImageFile,
    pub preview: String,
}

/// Images picked or captured but not yet submitted. Preview and payload
/// entry live in one slot so removal by position drops both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingImages {
    entries: Vec<PendingImage>,
}

impl PendingImages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the file and returns its position.
    pub fn add(&mut self, file: ImageFile) -> usize {
        let preview = file.data_url();
        self.entries.push(PendingImage { file, preview });
        self.entries.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<ImageFile> {
        if index < self.entries.len() {
            Some(self.entries.remove(index).file)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn previews(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.preview.as_str())
    }

    pub fn files(&self) -> impl Iterator<Item = &ImageFile> {
        self.entries.iter().map(|e| &e.file)
    }

    pub fn entries(&self) -> &[PendingImage] {
        &self.entries
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub file: ImageFile,
}

/// Transport-neutral multipart body: ordered text fields plus file parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: ImageFile) -> Self {
        self.files.push(FilePart {
            name: name.into(),
            file,
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ImageFile> + 'a {
        self.files.iter().filter(move |p| p.name == name).map(|p| &p.file)
    }
}
