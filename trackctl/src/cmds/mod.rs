pub use list::*;
pub use parse::*;
pub use track::*;

mod list;
mod parse;
mod track;
