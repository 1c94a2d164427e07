use super::Extractor;
use crate::core::error::ExtractError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;

const DOCUMENT_XML: &str = "word/document.xml";

/// Office Open XML documents: text runs of `word/document.xml`, one line per paragraph.
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extensions(&self) -> &[&'static str] {
        &["docx"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ExtractError::Corrupt(format!("Failed to open DOCX as ZIP: {}", e)))?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_XML)
            .map_err(|e| ExtractError::Corrupt(format!("Invalid DOCX, missing {}: {}", DOCUMENT_XML, e)))?
            .read_to_string(&mut xml)?;

        document_xml_to_text(&xml)
    }
}

pub(crate) fn document_xml_to_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| ExtractError::Corrupt(format!("Bad XML text: {}", e)))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExtractError::Corrupt(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(text.trim_end().to_string())
}


