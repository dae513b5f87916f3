//! Filename and media-type helpers for uploaded files.
//!
//! Uploads keep their logical name through compression; only the extension
//! changes to match the encoded format:
//! - `photo.png` → `photo.webp`
//! - `IMG_0042.HEIC` → `IMG_0042.jpg` (after HEIC conversion) → `IMG_0042.webp`
//! - `scan` → `scan.webp`

/// Media types (and filename suffixes) that need HEIC/HEIF conversion.
const HEIC_MEDIA_TYPES: &[&str] = &["image/heic", "image/heif"];
const HEIC_SUFFIXES: &[&str] = &["heic", "heif"];

/// Byte offset of the final extension dot, if the last path segment has one
/// followed by at least one character.
fn extension_dot(name: &str) -> Option<usize> {
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    (!ext.is_empty() && !ext.contains('/')).then_some(dot)
}

/// Final extension without the dot, as written.
pub fn extension(name: &str) -> Option<&str> {
    extension_dot(name).map(|dot| &name[dot + 1..])
}

/// Replace the final extension with `ext`, or append it when there is none.
///
/// - `"photo.png"` → `"photo.webp"`
/// - `"archive.tar.gz"` → `"archive.tar.webp"`
/// - `"scan"` → `"scan.webp"`
/// - `"trailing."` → `"trailing.webp"`
pub fn replace_extension(name: &str, ext: &str) -> String {
    match extension_dot(name) {
        Some(dot) => format!("{}.{}", &name[..dot], ext),
        None if name.ends_with('.') => format!("{}{}", name, ext),
        None => format!("{}.{}", name, ext),
    }
}

/// True when the name ends in `.heic` or `.heif`, any case.
pub fn has_heic_suffix(name: &str) -> bool {
    extension(name).is_some_and(|ext| {
        HEIC_SUFFIXES
            .iter()
            .any(|suffix| ext.eq_ignore_ascii_case(suffix))
    })
}

/// True when the declared media type is HEIC or HEIF.
pub fn is_heic_media_type(media_type: &str) -> bool {
    HEIC_MEDIA_TYPES
        .iter()
        .any(|t| media_type.trim().eq_ignore_ascii_case(t))
}

/// Name for the JPEG produced by HEIC conversion.
///
/// Only a `.heic`/`.heif` suffix is rewritten; a HEIC detected by media type
/// alone keeps its name.
pub fn heic_to_jpeg_name(name: &str) -> String {
    if has_heic_suffix(name) {
        replace_extension(name, "jpg")
    } else {
        name.to_string()
    }
}

/// Media type for a filename, by extension. Unknown → `application/octet-stream`.
pub fn media_type_for_name(name: &str) -> &'static str {
    let Some(ext) = extension(name) else {
        return "application/octet-stream";
    };
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => "application/octet-stream",
    }
}
