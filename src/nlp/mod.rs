//! Text processing layer: tokenization, vocabulary and embeddings.

pub mod matrix;
pub mod sentences;
pub mod tokenizer;
pub mod vocab;
pub mod word2vec;

pub use tokenizer::Tokenizer;
pub use vocab::Vocabulary;
pub use word2vec::WordVectors;
