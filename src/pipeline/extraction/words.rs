use super::types::{BoundingBox, OcrPage, WordToken};

/// Flatten one OCR page into positioned word tokens, in reading order of the
/// export (block, then line, then word).
///
/// Words without usable geometry are skipped; everything else is kept
/// verbatim, including empty values.
pub fn extract_words(page: &OcrPage) -> Vec<WordToken> {
    let mut tokens = Vec::new();
    let mut skipped = 0usize;

    for (block_index, block) in page.blocks.iter().enumerate() {
        for (line_index, line) in block.lines.iter().enumerate() {
            for (word_index, word) in line.words.iter().enumerate() {
                match word.geometry.as_ref().and_then(BoundingBox::from_geometry) {
                    Some(bbox) => tokens.push(WordToken::new(
                        &word.value,
                        bbox,
                        block_index,
                        line_index,
                        word_index,
                    )),
                    None => skipped += 1,
                }
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, kept = tokens.len(), "Words without geometry skipped");
    }

    tokens
}
