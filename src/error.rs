use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndicatorBankError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Workbook has no sheets")]
    EmptyWorkbook,

    #[error("Invalid cell reference '{0}'")]
    InvalidCellRef(String),

    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Duplicate column '{0}' in table schema")]
    DuplicateColumn(String),

    #[error("Row has {found} cells but the table has {expected} columns")]
    RowWidthMismatch { expected: usize, found: usize },

    #[error("No folders found under '{0}'")]
    NoFolders(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Document source error: {0}")]
    Source(String),

    #[error("Workbook parse error: {0}")]
    WorkbookError(#[from] calamine::XlsxError),

    #[error("Workbook write error: {0}")]
    ExportError(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndicatorBankError>;
