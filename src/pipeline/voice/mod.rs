pub mod numbers;
pub mod parser;
pub mod stream;

pub use numbers::{parse_spoken_number, spoken_words};
pub use parser::*;
pub use stream::*;
