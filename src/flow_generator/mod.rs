pub mod error;
pub mod protocol_logs;

pub use error::{Error, Result};
pub use protocol_logs::{
    DecodedField, FieldSink, FieldValue, LogMessageType, MysqlLog, NullSink, ParseParam, PduInfo,
    SinkEntry, VecSink,
};
