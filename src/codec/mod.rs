pub mod reader;
pub mod writer;
pub mod types;
pub mod hex;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;
pub use types::*;
pub use hex::{hex_dump, hex_string};
