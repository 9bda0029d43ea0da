//! Greedy WordPiece tokenizer for sentence-transformer vocabularies.
//!
//! Matches the encoding of the MiniLM family: lowercase, whitespace
//! split, greedy longest-piece matching with "##" continuations, then
//! [CLS]/[SEP] framing padded to a fixed sequence length.

use std::collections::HashMap;

use crate::constants::{MAX_PIECE_LENGTH, MAX_SEQUENCE_LENGTH};

const PAD_FALLBACK: u32 = 0;
const UNK_FALLBACK: u32 = 100;
const CLS_FALLBACK: u32 = 101;
const SEP_FALLBACK: u32 = 102;

/// A loaded WordPiece vocabulary. Token id is the line index.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    pieces: HashMap<String, u32>,
    pad_id: u32,
    unk_id: u32,
    cls_id: u32,
    sep_id: u32,
}

impl Vocabulary {
    /// Build from vocab.txt lines, one piece per line.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pieces = HashMap::new();
        for (idx, line) in lines.into_iter().enumerate() {
            let piece = line.as_ref().trim();
            if !piece.is_empty() {
                pieces.insert(piece.to_string(), idx as u32);
            }
        }
        let lookup = |token: &str, fallback: u32| pieces.get(token).copied().unwrap_or(fallback);
        let pad_id = lookup("[PAD]", PAD_FALLBACK);
        let unk_id = lookup("[UNK]", UNK_FALLBACK);
        let cls_id = lookup("[CLS]", CLS_FALLBACK);
        let sep_id = lookup("[SEP]", SEP_FALLBACK);
        Self { pieces, pad_id, unk_id, cls_id, sep_id }
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    fn id_of(&self, piece: &str) -> Option<u32> {
        self.pieces.get(piece).copied()
    }
}

/// Fixed-length encoded sequence ready for the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoding {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl Encoding {
    /// Number of real (unpadded) positions.
    pub fn active_len(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

/// Tokenize and encode `text` to a fixed [`MAX_SEQUENCE_LENGTH`] sequence.
pub fn encode(vocab: &Vocabulary, text: &str) -> Encoding {
    let normalized = text.to_lowercase();
    let mut ids: Vec<u32> = vec![vocab.cls_id];

    'words: for word in normalized.split_whitespace() {
        if ids.len() >= MAX_SEQUENCE_LENGTH - 1 {
            break;
        }
        // Whole-word hit first, then greedy subword matching.
        if let Some(id) = vocab.id_of(word) {
            ids.push(id);
            continue;
        }
        let chars: Vec<char> = word.chars().collect();
        let mut pos = 0;
        let mut is_first = true;
        while pos < chars.len() {
            if ids.len() >= MAX_SEQUENCE_LENGTH - 1 {
                break 'words;
            }
            let max_len = MAX_PIECE_LENGTH.min(chars.len() - pos);
            let mut matched = None;
            for len in (1..=max_len).rev() {
                let piece: String = chars[pos..pos + len].iter().collect();
                let candidate = if is_first { piece } else { format!("##{piece}") };
                if let Some(id) = vocab.id_of(&candidate) {
                    matched = Some((id, len));
                    break;
                }
            }
            match matched {
                Some((id, len)) => {
                    ids.push(id);
                    pos += len;
                }
                None => {
                    ids.push(vocab.unk_id);
                    pos += 1;
                }
            }
            is_first = false;
        }
    }

    ids.push(vocab.sep_id);

    let active = ids.len();
    let mut input_ids: Vec<i64> = ids.into_iter().map(i64::from).collect();
    let mut attention_mask = vec![1i64; active];
    input_ids.resize(MAX_SEQUENCE_LENGTH, i64::from(vocab.pad_id));
    attention_mask.resize(MAX_SEQUENCE_LENGTH, 0);

    Encoding {
        input_ids,
        attention_mask,
        token_type_ids: vec![0; MAX_SEQUENCE_LENGTH],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vocab() -> Vocabulary {
        Vocabulary::from_lines([
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "hello", "world", "un", "##believ", "##able",
            "##s", "the",
        ])
    }

    #[test]
    fn test_special_ids_resolved_from_vocab() {
        let v = test_vocab();
        assert_eq!(v.pad_id, 0);
        assert_eq!(v.unk_id, 1);
        assert_eq!(v.cls_id, 2);
        assert_eq!(v.sep_id, 3);
    }

    #[test]
    fn test_whole_word_lookup() {
        let v = test_vocab();
        let enc = encode(&v, "Hello WORLD");
        assert_eq!(&enc.input_ids[..4], &[2, 4, 5, 3]);
        assert_eq!(enc.active_len(), 4);
    }

    #[test]
    fn test_greedy_subword_split() {
        let v = test_vocab();
        let enc = encode(&v, "unbelievable");
        // un + ##believ + ##able
        assert_eq!(&enc.input_ids[..5], &[2, 6, 7, 8, 3]);
    }

    #[test]
    fn test_unknown_char_emits_unk_and_advances() {
        let v = test_vocab();
        let enc = encode(&v, "worlds!");
        // world + ##s, then "!" has no piece and falls back to [UNK].
        assert_eq!(&enc.input_ids[..5], &[2, 5, 9, 1, 3]);
        assert_eq!(*enc.input_ids.last().unwrap(), 0);
    }

    #[test]
    fn test_padded_to_fixed_length() {
        let v = test_vocab();
        let enc = encode(&v, "hello");
        assert_eq!(enc.input_ids.len(), MAX_SEQUENCE_LENGTH);
        assert_eq!(enc.attention_mask.len(), MAX_SEQUENCE_LENGTH);
        assert_eq!(enc.token_type_ids.len(), MAX_SEQUENCE_LENGTH);
        assert_eq!(enc.attention_mask[..3], [1, 1, 1]);
        assert_eq!(enc.attention_mask[3], 0);
    }

    #[test]
    fn test_long_input_truncated_with_sep() {
        let v = test_vocab();
        let text = "hello ".repeat(300);
        let enc = encode(&v, &text);
        assert_eq!(enc.active_len(), MAX_SEQUENCE_LENGTH);
        assert_eq!(enc.input_ids[MAX_SEQUENCE_LENGTH - 1], 3);
    }

    #[test]
    fn test_empty_input_is_cls_sep() {
        let v = test_vocab();
        let enc = encode(&v, "   ");
        assert_eq!(&enc.input_ids[..2], &[2, 3]);
        assert_eq!(enc.active_len(), 2);
    }
}
