//! The tokenizer collaborator.
//!
//! The formatter only needs text-to-ids conversion and the two reserved
//! sequence-boundary ids. Implementations must be safe to call from several
//! threads if a [`Formatter`](crate::engine::Formatter) is shared.

use std::sync::Arc;

use crate::error::TokenizerError;

/// A token id.
pub type TokenId = u32;

/// Converts text into token ids.
pub trait Tokenizer {
    /// Encode `text` without adding any special tokens.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenizerError`] if the text cannot be encoded.
    fn text_to_ids(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError>;

    /// Reserved begin-of-sequence id.
    fn bos_id(&self) -> TokenId;

    /// Reserved end-of-sequence id.
    fn eos_id(&self) -> TokenId;
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn text_to_ids(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        (**self).text_to_ids(text)
    }

    fn bos_id(&self) -> TokenId {
        (**self).bos_id()
    }

    fn eos_id(&self) -> TokenId {
        (**self).eos_id()
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Box<T> {
    fn text_to_ids(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        (**self).text_to_ids(text)
    }

    fn bos_id(&self) -> TokenId {
        (**self).bos_id()
    }

    fn eos_id(&self) -> TokenId {
        (**self).eos_id()
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Arc<T> {
    fn text_to_ids(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        (**self).text_to_ids(text)
    }

    fn bos_id(&self) -> TokenId {
        (**self).bos_id()
    }

    fn eos_id(&self) -> TokenId {
        (**self).eos_id()
    }
}

/// Byte-level tokenizer: one id per UTF-8 byte.
///
/// Ids `0..=255` are bytes; BOS and EOS default to `256` and `257`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteTokenizer {
    bos: TokenId,
    eos: TokenId,
}

impl ByteTokenizer {
    /// Default begin-of-sequence id.
    pub const DEFAULT_BOS: TokenId = 256;
    /// Default end-of-sequence id.
    pub const DEFAULT_EOS: TokenId = 257;

    /// Create a byte tokenizer with the default reserved ids.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bos: Self::DEFAULT_BOS,
            eos: Self::DEFAULT_EOS,
        }
    }

    /// Override the reserved ids.
    #[must_use]
    pub const fn with_special_ids(mut self, bos: TokenId, eos: TokenId) -> Self {
        self.bos = bos;
        self.eos = eos;
        self
    }
}

impl Default for ByteTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for ByteTokenizer {
    fn text_to_ids(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        Ok(text.bytes().map(TokenId::from).collect())
    }

    fn bos_id(&self) -> TokenId {
        self.bos
    }

    fn eos_id(&self) -> TokenId {
        self.eos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_tokenizer() {
        let tok = ByteTokenizer::new();
        assert_eq!(tok.text_to_ids("Hi").expect("encode"), vec![72, 105]);
        assert_eq!(tok.text_to_ids("").expect("encode"), Vec::<TokenId>::new());
        assert_eq!(tok.text_to_ids("é").expect("encode").len(), 2);
        assert_eq!(tok.bos_id(), 256);
        assert_eq!(tok.eos_id(), 257);
    }

    #[test]
    fn test_custom_special_ids() {
        let tok = ByteTokenizer::new().with_special_ids(1, 2);
        assert_eq!((tok.bos_id(), tok.eos_id()), (1, 2));
    }

    #[test]
    fn test_blanket_impls() {
        fn ids<T: Tokenizer>(t: &T) -> Vec<TokenId> {
            t.text_to_ids("a").expect("encode")
        }
        let tok = ByteTokenizer::new();
        let shared: Arc<dyn Tokenizer + Send + Sync> = Arc::new(tok);
        let boxed: Box<dyn Tokenizer> = Box::new(tok);
        assert_eq!(ids(&&tok), vec![97]);
        assert_eq!(ids(&shared), vec![97]);
        assert_eq!(ids(&boxed), vec![97]);
        assert_eq!(shared.bos_id(), 256);
    }
}
