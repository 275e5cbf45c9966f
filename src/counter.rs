// src/counter.rs
//
// Word counting for uploaded documents. Pure: bytes + declared type in,
// count out. Plain text decodes UTF-8 first and falls back through
// windows-1252 and latin-1 so files from legacy authoring tools do not
// hard-fail. A token is a run of word characters; punctuation-only runs do
// not count.

use std::io::{Cursor, Read};

use encoding_rs::WINDOWS_1252;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;
use zip::ZipArchive;

pub const ALLOWED_EXTENSIONS: [&str; 2] = [".txt", ".docx"];
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CountError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Txt,
    Docx,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".txt" => Some(FileKind::Txt),
            ".docx" => Some(FileKind::Docx),
            _ => None,
        }
    }

    /// Lowercased extension of the declared filename, dot included.
    pub fn extension_of(filename: &str) -> Option<String> {
        let dot = filename.rfind('.')?;
        Some(filename[dot..].to_ascii_lowercase())
    }
}

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));

fn count_tokens(text: &str) -> u32 {
    WORD_RE.find_iter(text).count() as u32
}

/// UTF-8, then windows-1252, then latin-1. The last step maps every byte to
/// a char and cannot fail, so decoding is total: an empty or binary file
/// yields a count, never an error.
fn decode_text(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    let (decoded, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    if !had_errors {
        return decoded.into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn count_txt(bytes: &[u8]) -> u32 {
    count_tokens(&decode_text(bytes))
}

/// Extract visible text from the document body: every `<w:t>` run,
/// accumulated per paragraph so a word split across runs is still one token.
/// Table cell text lives in paragraphs inside the cells, so walking all
/// paragraphs covers body and tables alike.
fn count_docx(bytes: &[u8]) -> Result<u32, CountError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CountError::InvalidDocument(format!("not a docx archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| CountError::InvalidDocument(format!("missing document body: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| CountError::InvalidDocument(format!("unreadable document body: {e}")))?;

    let mut reader = Reader::from_str(&xml);
    let mut in_text_run = false;
    let mut paragraph = String::new();
    let mut total: u32 = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => {
                    total += count_tokens(&paragraph);
                    paragraph.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let text = t
                    .unescape()
                    .map_err(|e| CountError::InvalidDocument(format!("bad entity: {e}")))?;
                paragraph.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(CountError::InvalidDocument(format!("malformed XML: {e}")));
            }
        }
    }

    // Text runs outside any closed paragraph still count.
    total += count_tokens(&paragraph);

    Ok(total)
}

/// Count words in `bytes` according to the stored file type. An unrecognized
/// type is a reported error, not a silent zero.
pub fn count_words(bytes: &[u8], file_type: &str) -> Result<u32, CountError> {
    match FileKind::from_extension(file_type) {
        Some(FileKind::Txt) => Ok(count_txt(bytes)),
        Some(FileKind::Docx) => count_docx(bytes),
        None => Err(CountError::UnsupportedType(file_type.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::FileOptions;
    use zip::ZipWriter;

    use super::*;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut buffer));
            writer
                .start_file("word/document.xml", FileOptions::default())
                .unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buffer
    }

    #[test]
    fn counts_words_ignoring_punctuation() {
        assert_eq!(count_words(b"Hello, world! 123", ".txt").unwrap(), 3);
    }

    #[test]
    fn empty_file_counts_zero() {
        assert_eq!(count_words(b"", ".txt").unwrap(), 0);
    }

    #[test]
    fn punctuation_only_counts_zero() {
        assert_eq!(count_words(b"... !!! ---", ".txt").unwrap(), 0);
    }

    #[test]
    fn underscores_and_digits_are_word_characters() {
        assert_eq!(count_words(b"snake_case x2", ".txt").unwrap(), 2);
    }

    #[test]
    fn windows_1252_fallback() {
        // "café au lait" with a latin-1/cp1252 e-acute; invalid UTF-8.
        let bytes = b"caf\xe9 au lait";
        assert_eq!(count_words(bytes, ".txt").unwrap(), 3);
    }

    #[test]
    fn latin_1_fallback_for_bytes_undefined_in_cp1252() {
        // 0x81 is undefined in windows-1252; the latin-1 pass still decodes.
        let bytes = b"one \x81 two";
        assert_eq!(count_words(bytes, ".txt").unwrap(), 2);
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let err = count_words(b"hello", ".pdf").unwrap_err();
        assert!(matches!(err, CountError::UnsupportedType(_)));
    }

    #[test]
    fn docx_counts_paragraphs_and_table_cells() {
        let xml = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>Hello world</w:t></w:r></w:p>
                <w:tbl>
                  <w:tr>
                    <w:tc><w:p><w:r><w:t>cell one</w:t></w:r></w:p></w:tc>
                    <w:tc><w:p><w:r><w:t>cell two</w:t></w:r></w:p></w:tc>
                  </w:tr>
                </w:tbl>
              </w:body>
            </w:document>"#;
        assert_eq!(count_words(&docx_bytes(xml), ".docx").unwrap(), 6);
    }

    #[test]
    fn docx_word_split_across_runs_is_one_token() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>Hel</w:t></w:r><w:r><w:t>lo</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        assert_eq!(count_words(&docx_bytes(xml), ".docx").unwrap(), 1);
    }

    #[test]
    fn docx_ignores_non_text_markup() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t>styled</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        assert_eq!(count_words(&docx_bytes(xml), ".docx").unwrap(), 1);
    }

    #[test]
    fn truncated_docx_is_invalid_not_zero() {
        let err = count_words(b"PK\x03\x04 not really a zip", ".docx").unwrap_err();
        assert!(matches!(err, CountError::InvalidDocument(_)));
    }

    #[test]
    fn extension_extraction_lowercases() {
        assert_eq!(FileKind::extension_of("Report.TXT").as_deref(), Some(".txt"));
        assert_eq!(FileKind::extension_of("doc.docx").as_deref(), Some(".docx"));
        assert_eq!(FileKind::extension_of("noextension"), None);
    }
}
