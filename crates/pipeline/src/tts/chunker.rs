//! Sentence-respecting chunking for streaming synthesis
//!
//! Splits text into ordered chunks of roughly `target_words` words without
//! ever breaking a sentence. Pure and deterministic: the same text and
//! target always produce the same boundaries.

use narrate_core::Chunk;
use unicode_segmentation::UnicodeSegmentation;

use crate::PipelineError;

/// Default chunk size in words
pub const DEFAULT_TARGET_WORDS: usize = 150;

/// Split text into pending chunks of up to `target_words` words
///
/// Sentences are accumulated greedily: a chunk closes when adding the next
/// sentence would exceed the target. A single over-long sentence still forms
/// its own chunk, and the final chunk takes whatever remains. Chunk text is
/// the source sentences joined by single spaces, trimmed.
pub fn chunk_text(text: &str, target_words: usize) -> Result<Vec<Chunk>, PipelineError> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Err(PipelineError::EmptyText);
    }

    let target = target_words.max(1);
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current = String::new();
    let mut current_words = 0usize;

    for sentence in sentences {
        let words = sentence.unicode_words().count();
        if !current.is_empty() && current_words + words > target {
            chunks.push(Chunk::new(chunks.len(), std::mem::take(&mut current)));
            current_words = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
        current_words += words;
    }

    if !current.is_empty() {
        chunks.push(Chunk::new(chunks.len(), current));
    }

    Ok(chunks)
}

/// Split on sentence-ending punctuation runs followed by whitespace
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut in_terminator = false;

    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            in_terminator = true;
        } else if in_terminator {
            if c.is_whitespace() {
                let sentence = text[start..i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = i;
            }
            in_terminator = false;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrate_core::ChunkStatus;

    #[test]
    fn test_empty_text_is_an_error() {
        assert!(matches!(chunk_text("", 150), Err(PipelineError::EmptyText)));
        assert!(matches!(
            chunk_text("   \n\t ", 150),
            Err(PipelineError::EmptyText)
        ));
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        // 40 words, well under the target
        let text = (0..39).fold("Start".to_string(), |acc, i| format!("{acc} w{i}")) + ".";
        let chunks = chunk_text(&text, 150).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].status, ChunkStatus::Pending);
        assert_eq!(chunks[0].word_count(), 40);
    }

    #[test]
    fn test_sentences_are_never_split() {
        let text = "One two three four. Five six seven eight. Nine ten eleven twelve.";
        let chunks = chunk_text(text, 5).unwrap();
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.text.ends_with('.'));
        }
        assert_eq!(chunks[0].text, "One two three four.");
        assert_eq!(chunks[1].text, "Five six seven eight.");
        assert_eq!(chunks[2].text, "Nine ten eleven twelve.");
    }

    #[test]
    fn test_sentences_accumulate_up_to_target() {
        let text = "One two three. Four five six. Seven eight nine. Ten.";
        let chunks = chunk_text(text, 6).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "One two three. Four five six.");
        assert_eq!(chunks[1].text, "Seven eight nine. Ten.");
    }

    #[test]
    fn test_overlong_sentence_gets_its_own_chunk() {
        let text = "Tiny. This single sentence has rather more words than the target allows. End.";
        let chunks = chunk_text(text, 3).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Tiny.");
        assert!(chunks[1].text.starts_with("This single sentence"));
        assert_eq!(chunks[2].text, "End.");
    }

    #[test]
    fn test_concatenation_reproduces_sentence_sequence() {
        let text = "Alpha beta gamma! Delta epsilon? Zeta eta theta. Iota kappa.";
        let chunks = chunk_text(text, 4).unwrap();
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, text);
    }

    #[test]
    fn test_indices_are_sequential() {
        let text = "A b c. D e f. G h i. J k l. M n o.";
        let chunks = chunk_text(text, 3).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "First one. Second one! Third one? Fourth one. Fifth one.";
        let a = chunk_text(text, 4).unwrap();
        let b = chunk_text(text, 4).unwrap();
        let texts = |chunks: &[Chunk]| chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>();
        assert_eq!(texts(&a), texts(&b));
    }

    #[test]
    fn test_no_terminal_punctuation() {
        let chunks = chunk_text("no punctuation at all here", 150).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "no punctuation at all here");
    }

    #[test]
    fn test_ellipsis_is_one_terminator_run() {
        let chunks = chunk_text("Wait... really? Yes.", 1).unwrap();
        assert_eq!(chunks[0].text, "Wait...");
        assert_eq!(chunks[1].text, "really?");
        assert_eq!(chunks[2].text, "Yes.");
    }
}
