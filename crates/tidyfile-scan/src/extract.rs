//! Per-file metadata extraction and content sampling.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::{Encoding, GBK, UTF_16BE, WINDOWS_1252};
use image::ImageFormat;
use lopdf::{Dictionary, Document, Object};
use serde_json::Value;

use tidyfile_core::MetadataMap;

/// Sample produced when no supported encoding yields readable text.
pub const BINARY_SENTINEL: &str = "[binary or unsupported encoding]";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Info dictionary entries copied into the metadata map.
const PDF_INFO_KEYS: &[(&str, &str)] = &[
    ("Title", "title"),
    ("Author", "author"),
    ("Subject", "subject"),
    ("Creator", "creator"),
    ("Producer", "producer"),
];

/// Guess a mime type from a lower-cased extension.
pub fn mime_type_for(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(mime)
}

/// Extract format-specific metadata for a file.
///
/// Never fails: a format-specific error is recorded under
/// `extraction_error` and the remaining keys are kept.
pub fn extract_metadata(path: &Path, extension: &str) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    metadata.insert(
        "mime_type".to_string(),
        mime_type_for(extension).map_or(Value::Null, Value::from),
    );

    if extension == "pdf" {
        if let Err(e) = pdf_metadata(path, &mut metadata) {
            metadata.insert("extraction_error".to_string(), Value::from(e.to_string()));
        }
    } else if IMAGE_EXTENSIONS.contains(&extension) {
        match image::image_dimensions(path) {
            Ok((width, height)) => {
                metadata.insert("width".to_string(), Value::from(width));
                metadata.insert("height".to_string(), Value::from(height));
                if let Some(format) = ImageFormat::from_extension(extension) {
                    metadata.insert(
                        "format".to_string(),
                        Value::from(format!("{format:?}").to_uppercase()),
                    );
                }
            }
            Err(e) => {
                metadata.insert("extraction_error".to_string(), Value::from(e.to_string()));
            }
        }
    }

    metadata
}

fn pdf_metadata(path: &Path, metadata: &mut MetadataMap) -> Result<(), lopdf::Error> {
    let doc = Document::load(path)?;
    metadata.insert("page_count".to_string(), Value::from(doc.get_pages().len()));

    let Some(info) = pdf_info(&doc) else {
        return Ok(());
    };
    for &(key, name) in PDF_INFO_KEYS {
        let value = info
            .get(key.as_bytes())
            .ok()
            .and_then(|object| pdf_text_string(resolve(&doc, object)))
            .filter(|text| !text.is_empty());
        if let Some(text) = value {
            metadata.insert(name.to_string(), Value::from(text));
        }
    }
    Ok(())
}

fn pdf_info(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info).as_dict().ok()
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, otherwise
/// treated as PDFDocEncoding, which Windows-1252 approximates.
fn pdf_text_string(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    let (text, _) = match bytes.strip_prefix(b"\xFE\xFF") {
        Some(utf16) => UTF_16BE.decode_without_bom_handling(utf16),
        None => WINDOWS_1252.decode_without_bom_handling(bytes),
    };
    Some(text.trim().to_string())
}

/// Extract the first `max_chars` characters of text from a PDF.
///
/// Whitespace runs collapse to a single space and control characters are
/// dropped. A document without a text layer yields [`BINARY_SENTINEL`].
pub fn sample_pdf_text(path: &Path, max_chars: usize) -> String {
    let text = match pdf_extract::extract_text(path) {
        Ok(text) => text,
        Err(e) => return format!("[unreadable: {e}]"),
    };

    let cleaned: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .take(max_chars)
        .collect();

    if cleaned.is_empty() {
        BINARY_SENTINEL.to_string()
    } else {
        cleaned
    }
}

/// Read the first `max_chars` characters of a file.
///
/// Decoding tries UTF-8, then GBK, then Windows-1252. A decode that yields
/// control characters other than common whitespace counts as a failure.
/// When every encoding fails, [`BINARY_SENTINEL`] is returned.
pub fn sample_content(path: &Path, max_chars: usize) -> String {
    // Four bytes covers the widest UTF-8 scalar.
    let limit = (max_chars as u64).saturating_mul(4);
    let mut bytes = Vec::new();
    if let Err(e) = File::open(path).and_then(|f| f.take(limit).read_to_end(&mut bytes)) {
        return format!("[unreadable: {e}]");
    }
    let truncated = bytes.len() as u64 == limit;

    decode_utf8(&bytes, truncated)
        .or_else(|| decode_legacy(GBK, &bytes, truncated))
        .or_else(|| decode_legacy(WINDOWS_1252, &bytes, truncated))
        .map(|text| text.chars().take(max_chars).collect())
        .unwrap_or_else(|| BINARY_SENTINEL.to_string())
}

fn decode_utf8(bytes: &[u8], truncated: bool) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        // A multi-byte sequence cut off by the read limit is not an error.
        Err(e) if truncated && e.error_len().is_none() => {
            std::str::from_utf8(&bytes[..e.valid_up_to()]).ok()?
        }
        Err(_) => return None,
    };
    looks_textual(text).then(|| text.to_string())
}

fn decode_legacy(encoding: &'static Encoding, bytes: &[u8], truncated: bool) -> Option<String> {
    let decoded = encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .or_else(|| {
            let (_, head) = bytes.split_last().filter(|_| truncated)?;
            encoding.decode_without_bom_handling_and_without_replacement(head)
        })?;
    looks_textual(&decoded).then(|| decoded.into_owned())
}

fn looks_textual(text: &str) -> bool {
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0c'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sample_utf8_truncates_to_chars() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("note.txt");
        fs::write(&path, "héllo wörld, this is long").unwrap();

        assert_eq!(sample_content(&path, 5), "héllo");
    }

    #[test]
    fn test_sample_gbk_text() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gbk.txt");
        let (encoded, _, _) = GBK.encode("文件整理");
        fs::write(&path, &encoded).unwrap();

        assert_eq!(sample_content(&path, 100), "文件整理");
    }

    #[test]
    fn test_sample_binary_yields_sentinel() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.bin");
        fs::write(&path, [0x00u8, 0xFF, 0x00, 0x01, 0xFE, 0x00]).unwrap();

        assert_eq!(sample_content(&path, 100), BINARY_SENTINEL);
    }

    #[test]
    fn test_sample_missing_file_does_not_panic() {
        let temp = TempDir::new().unwrap();
        let sample = sample_content(&temp.path().join("gone.txt"), 10);
        assert!(sample.starts_with("[unreadable"));
    }

    #[test]
    fn test_metadata_mime_type() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.pdf");
        fs::write(&path, "%PDF-1.4").unwrap();

        let metadata = extract_metadata(&path, "pdf");
        assert_eq!(metadata["mime_type"], Value::from("application/pdf"));
    }

    #[test]
    fn test_metadata_broken_image_records_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fake.png");
        fs::write(&path, "not a png").unwrap();

        let metadata = extract_metadata(&path, "png");
        assert!(metadata.contains_key("extraction_error"));
        assert_eq!(metadata["mime_type"], Value::from("image/png"));
    }

    fn write_pdf(path: &Path, pages: usize, text: &str) {
        use lopdf::content::{Content, Operation as PdfOp};
        use lopdf::{Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                PdfOp::new("BT", vec![]),
                PdfOp::new("Tf", vec!["F1".into(), 24.into()]),
                PdfOp::new("Td", vec![100.into(), 600.into()]),
                PdfOp::new("Tj", vec![Object::string_literal(text)]),
                PdfOp::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                })
                .into()
            })
            .collect();
        let page_tree = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(page_tree));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Quarterly report"),
            "Author" => Object::string_literal("Finance"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_pdf_metadata() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.pdf");
        write_pdf(&path, 2, "Hello tidyfile");

        let metadata = extract_metadata(&path, "pdf");
        assert_eq!(metadata["page_count"], Value::from(2));
        assert_eq!(metadata["title"], Value::from("Quarterly report"));
        assert_eq!(metadata["author"], Value::from("Finance"));
        assert!(!metadata.contains_key("subject"));
        assert!(!metadata.contains_key("extraction_error"));
    }

    #[test]
    fn test_pdf_text_sample() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.pdf");
        write_pdf(&path, 1, "Hello tidyfile");

        let sample = sample_pdf_text(&path, 1000);
        assert!(sample.contains("Hello"), "sample was {sample:?}");
        assert!(!sample.contains('\n'));
        assert!(sample_pdf_text(&path, 3).chars().count() <= 3);
    }

    #[test]
    fn test_broken_pdf_records_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.pdf");
        fs::write(&path, "%PDF-1.4 nothing else").unwrap();

        let metadata = extract_metadata(&path, "pdf");
        assert!(metadata.contains_key("extraction_error"));
        assert!(!metadata.contains_key("page_count"));
        assert!(sample_pdf_text(&path, 100).starts_with("[unreadable"));
    }

    #[test]
    fn test_unknown_extension_has_null_mime() {
        assert_eq!(mime_type_for("xyz"), None);
    }
}
