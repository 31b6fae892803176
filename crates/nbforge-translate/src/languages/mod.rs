//! Built-in translators

mod bash;
mod julia;
mod python;
mod r;
mod scala;

pub use bash::BashTranslator;
pub use julia::JuliaTranslator;
pub use python::PythonTranslator;
pub use r::RTranslator;
pub use scala::ScalaTranslator;
