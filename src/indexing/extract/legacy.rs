use super::Extractor;
use crate::core::error::ExtractError;
use std::path::Path;

/// Groups whose content is formatting data rather than document text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "headerl", "headerr",
    "footer", "footerl", "footerr", "listtable", "listoverridetable", "rsidtbl", "generator",
    "xmlnstbl", "themedata", "colorschememapping", "latentstyles", "datastore", "object",
];

/// OLE compound file signature shared by every Word 97-2003 document.
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const MIN_RUN: usize = 4;

/// Rich Text Format with control words, groups and formatting tables stripped.
pub struct RtfExtractor;

impl Extractor for RtfExtractor {
    fn name(&self) -> &'static str {
        "rtf"
    }

    fn extensions(&self) -> &[&'static str] {
        &["rtf"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        let raw = String::from_utf8_lossy(&bytes);
        if !raw.trim_start().starts_with("{\\rtf") {
            return Err(ExtractError::Corrupt("missing {\\rtf header".to_string()));
        }
        Ok(rtf_to_text(&raw))
    }
}

pub(crate) fn rtf_to_text(rtf: &str) -> String {
    let chars: Vec<char> = rtf.chars().collect();
    let len = chars.len();
    let mut out = String::new();
    let mut groups: Vec<bool> = Vec::new();
    let mut skipping = false;
    let mut i = 0;

    while i < len {
        match chars[i] {
            '{' => {
                groups.push(skipping);
                i += 1;
            }
            '}' => {
                skipping = groups.pop().unwrap_or(false);
                i += 1;
            }
            '\\' => {
                let Some(next) = chars.get(i + 1).copied() else {
                    break;
                };
                match next {
                    '\\' | '{' | '}' => {
                        if !skipping {
                            out.push(next);
                        }
                        i += 2;
                    }
                    '~' => {
                        if !skipping {
                            out.push(' ');
                        }
                        i += 2;
                    }
                    '*' => {
                        skipping = true;
                        i += 2;
                    }
                    '\'' => {
                        let hex: String = chars.iter().skip(i + 2).take(2).collect();
                        if let (false, Ok(byte)) = (skipping, u8::from_str_radix(&hex, 16)) {
                            // cp1252 is close enough to latin-1 for search purposes
                            out.push(char::from(byte));
                        }
                        i += 4;
                    }
                    c if c.is_ascii_alphabetic() => {
                        let word_start = i + 1;
                        let mut j = word_start;
                        while j < len && chars[j].is_ascii_alphabetic() {
                            j += 1;
                        }
                        let word: String = chars[word_start..j].iter().collect();

                        let param_start = j;
                        if j < len && chars[j] == '-' {
                            j += 1;
                        }
                        while j < len && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        let param: Option<i32> =
                            chars[param_start..j].iter().collect::<String>().parse().ok();
                        if j < len && chars[j] == ' ' {
                            j += 1;
                        }
                        i = j;

                        if SKIPPED_DESTINATIONS.contains(&word.as_str()) {
                            skipping = true;
                            continue;
                        }
                        if skipping {
                            continue;
                        }

                        match word.as_str() {
                            "par" | "line" | "sect" | "page" | "row" => out.push('\n'),
                            "tab" | "cell" => out.push('\t'),
                            "u" => {
                                if let Some(code) = param {
                                    let code = if code < 0 { code + 65536 } else { code };
                                    if let Some(ch) = char::from_u32(code as u32) {
                                        out.push(ch);
                                    }
                                    i = skip_unicode_fallback(&chars, i);
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => i += 2,
                }
            }
            '\r' | '\n' => i += 1,
            c => {
                if !skipping {
                    out.push(c);
                }
                i += 1;
            }
        }
    }

    out.trim().to_string()
}

/// `\uN` is followed by one ANSI fallback character that must not be emitted.
fn skip_unicode_fallback(chars: &[char], i: usize) -> usize {
    match chars.get(i) {
        Some('\\') if chars.get(i + 1) == Some(&'\'') => i + 4,
        Some('\\') | Some('{') | Some('}') | None => i,
        Some(_) => i + 1,
    }
}

/// Word 97-2003 binary documents. The text stream is recovered as printable
/// runs, trying both 8-bit and UTF-16LE encodings and keeping the richer one.
pub struct DocExtractor;

impl Extractor for DocExtractor {
    fn name(&self) -> &'static str {
        "doc"
    }

    fn extensions(&self) -> &[&'static str] {
        &["doc"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        if !bytes.starts_with(&OLE_SIGNATURE) {
            return Err(ExtractError::Corrupt(
                "not an OLE compound document".to_string(),
            ));
        }
        Ok(recover_text(&bytes[OLE_SIGNATURE.len()..]))
    }
}

pub(crate) fn recover_text(bytes: &[u8]) -> String {
    let narrow = printable_runs(bytes.iter().copied());
    let wide = printable_runs(
        bytes
            .chunks_exact(2)
            .map(|pair| if pair[1] == 0 { pair[0] } else { 0 }),
    );

    let total = |runs: &Vec<String>| runs.iter().map(|r| r.len()).sum::<usize>();
    let runs = if total(&wide) >= total(&narrow) { wide } else { narrow };
    runs.join("\n")
}

fn printable_runs(bytes: impl Iterator<Item = u8>) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();

    for byte in bytes {
        if byte == b' ' || byte.is_ascii_graphic() {
            current.push(char::from(byte));
        } else {
            flush_run(&mut current, &mut runs);
        }
    }
    flush_run(&mut current, &mut runs);
    runs
}

fn flush_run(current: &mut String, runs: &mut Vec<String>) {
    let trimmed = current.trim();
    if trimmed.len() >= MIN_RUN && trimmed.chars().any(|c| c.is_ascii_alphabetic()) {
        runs.push(trimmed.to_string());
    }
    current.clear();
}


