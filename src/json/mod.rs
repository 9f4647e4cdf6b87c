//! JSON attribute support: paths, opaque documents, the value codec and
//! change comparers.

pub mod codec;
pub mod compare;
pub mod document;
pub mod path;

pub use codec::{JsonCodec, JsonShape};
pub use compare::{ChangeComparer, raw_text_unchanged, semantic_eq};
pub use document::{Document, JsonKind, Node};
pub use path::{JsonPath, JsonPathError, PathSegment};
