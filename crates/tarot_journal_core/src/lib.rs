pub mod catalog;
pub mod domain;
pub mod draw;
pub mod history;
pub mod lifecycle;
pub mod ports;
pub mod report;

pub use catalog::Catalog;
pub use domain::{
    Arcana, CardRef, DrawnCard, Interpretation, Position, Reading, ReadingRecord, StoredReading,
    Suit, TarotCard,
};
pub use history::{HistoryPager, PageLoad, PageSnapshot, PAGE_SIZE};
pub use lifecycle::{
    ExportReport, ExportSave, LifecycleError, Phase, ReadingSession, FALLBACK_REPORT_HTML,
};
pub use ports::{
    BlobStorage, Cursor, InterpretationService, PortError, PortResult, ReadingPage,
    ReadingRepository, ReportRenderer,
};
