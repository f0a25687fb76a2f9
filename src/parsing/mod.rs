pub mod c;
pub mod complexity;
pub mod parser;

pub use c::{CExtractor, CallReference, FileExtraction};
pub use complexity::{ComplexityMeasurer, CyclomaticMeasurer, MeasuredFile, NullMeasurer};
pub use parser::{Language, parse_source};
