// SPDX-License-Identifier: MPL-2.0
//! Format identifier to file extension mapping.

/// Preferred filename extension for a uniform type identifier. Falls back to
/// the identifier's last dotted component for unknown types, which is right
/// for the common `public.*` image formats.
pub fn preferred_extension(uti: &str) -> String {
    match uti {
        "public.jpeg" => "jpeg".to_string(),
        "public.png" => "png".to_string(),
        "public.heic" => "heic".to_string(),
        "public.heif" => "heif".to_string(),
        "public.tiff" => "tiff".to_string(),
        "com.compuserve.gif" => "gif".to_string(),
        "public.camera-raw-image" => "raw".to_string(),
        "com.adobe.raw-image" => "dng".to_string(),
        "com.canon.cr2-raw-image" => "cr2".to_string(),
        "com.nikon.raw-image" => "nef".to_string(),
        "com.sony.arw-raw-image" => "arw".to_string(),
        "com.apple.quicktime-movie" => "mov".to_string(),
        "public.mpeg-4" => "mp4".to_string(),
        other => other
            .rsplit('.')
            .next()
            .unwrap_or(other)
            .to_string(),
    }
}

/// Uniform type identifier for a filename, inferred from its extension.
/// Unknown extensions map to the generic data type.
pub fn uti_for_filename(filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "public.jpeg".to_string(),
        "png" => "public.png".to_string(),
        "heic" => "public.heic".to_string(),
        "heif" => "public.heif".to_string(),
        "tif" | "tiff" => "public.tiff".to_string(),
        "gif" => "com.compuserve.gif".to_string(),
        "raw" => "public.camera-raw-image".to_string(),
        "dng" => "com.adobe.raw-image".to_string(),
        "cr2" => "com.canon.cr2-raw-image".to_string(),
        "nef" => "com.nikon.raw-image".to_string(),
        "arw" => "com.sony.arw-raw-image".to_string(),
        "mov" => "com.apple.quicktime-movie".to_string(),
        "mp4" => "public.mpeg-4".to_string(),
        _ => "public.data".to_string(),
    }
}
