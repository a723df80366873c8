mod render;


pub use render::{FormatError, OutputFormat, render};
