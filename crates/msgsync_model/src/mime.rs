//! Canonical file extensions for media MIME types.

/// Returns the file extension (with leading dot) for a MIME type.
///
/// Unknown types map to an empty extension.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "video/mp4" => ".mp4",
        "video/3gpp" => ".3gp",
        "video/webm" => ".webm",
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/mp4" | "audio/aac" => ".m4a",
        "audio/ogg" => ".ogg",
        "audio/amr" => ".amr",
        "audio/3gpp" => ".3gp",
        "text/vcard" | "text/x-vcard" => ".vcf",
        _ => "",
    }
}
