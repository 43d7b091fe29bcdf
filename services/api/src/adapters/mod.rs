pub mod db;
pub mod export;
pub mod interpreter;

pub use db::SqlxReadingRepository;
pub use export::{HtmlReportRenderer, HttpBlobStore};
pub use interpreter::OpenAiInterpreterAdapter;
