/// A token in its integer form: the id the tokenizer assigned to the subword in its vocabulary.
///
/// Signed, because ids typed in by a user can be any integer.  Ids outside the vocabulary are
/// still rendered, as empty subwords.
///
/// The same id can appear any number of times in a token sequence.  Position in the sequence is
/// what distinguishes one occurrence from another.
pub type TokenInt = i64;

/// A token in its subword string form, as stored in the tokenizer's vocabulary.
///
/// Subword strings are not the original text.  Every byte of the original UTF-8 text has been
/// remapped to a printable character (see [`crate::ByteDecoder`]), and the last subword of each
/// word carries the end-of-word marker.
pub type Subword = String;
