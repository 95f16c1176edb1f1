/*
 * Copyright (c) 2024 Yunshan Networks
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use bitflags::bitflags;
use num_enum::TryFromPrimitive;
use serde::Serialize;

pub const PROTOCOL_VERSION: u8 = 10;

// Compressed Header
pub const COMPRESS_HEADER_LEN: usize = 7;
pub const COMPRESS_HEADER_SEQ_OFFSET: usize = 3;
pub const COMPRESS_HEADER_UNCOMPRESS_OFFSET: usize = 4;

// Header
pub const HEADER_LEN: usize = 4;
pub const NUMBER_OFFSET: usize = 3;

// Greeting
pub const SERVER_VERSION_EOF: u8 = 0;
pub const SALT_LEN: usize = 8;
pub const SALT2_MIN_LEN: usize = 13;
pub const GREETING_RESERVED_LEN: usize = 6;
pub const MARIADB_VERSION_PREFIX: &str = "5.5.5-";
pub const MARIADB_VERSION_MARKER: &str = "MariaDB";

// Login
pub const LOGIN_FIXED_LEN: usize = 32;
pub const LOGIN_FILLER_LEN: usize = 19;
pub const LOGIN_MARIADB_CAPS_LEN: usize = 4;

// Request
pub const STATEMENT_ID_SENTINEL: u32 = 0xffff_ffff;
pub const PARAMETER_FLAG_UNSIGNED: u8 = 0x80;
pub const EXECUTE_ROW_NULL_BITMAP_OFFSET: usize = 0;
pub const BINARY_ROW_NULL_BITMAP_OFFSET: usize = 2;
pub const CURSOR_PARAMETER_COUNT_AVAILABLE: u8 = 0x08;

// Bulk execute
pub const BULK_SEND_TYPES_TO_SERVER: u16 = 128;
pub const BULK_INDICATOR_NONE: u8 = 0;
pub const BULK_INDICATOR_NULL: u8 = 1;
pub const BULK_INDICATOR_DEFAULT: u8 = 2;
pub const BULK_INDICATOR_IGNORE: u8 = 3;

// Response
pub const SQL_STATE_LEN: usize = 5;
pub const SQL_STATE_MARKER: u8 = b'#';
pub const MARIADB_PROGRESS_CODE: u16 = 0xffff;
// an EOF packet carries at most warnings(2) + status(2) after its marker
pub const EOF_MAX_REMAINING: usize = 5;

pub const AUTH_MORE_DATA_FAST_AUTH_SUCCESS: u8 = 0x03;
pub const AUTH_MORE_DATA_FULL_AUTH: u8 = 0x04;

// int
pub const INT_FLAGS_NULL: u8 = 0xfb;
pub const INT_FLAGS_2: u8 = 0xfc;
pub const INT_FLAGS_3: u8 = 0xfd;
pub const INT_FLAGS_8: u8 = 0xfe;

pub const INT_BASE_LEN: usize = 1;

pub const MYSQL_RESPONSE_CODE_OK: u8 = 0;
pub const MYSQL_RESPONSE_CODE_AUTH_MORE_DATA: u8 = 0x01;
pub const MYSQL_RESPONSE_CODE_LOCAL_INFILE: u8 = 0xfb;
pub const MYSQL_RESPONSE_CODE_EOF: u8 = 0xfe;
pub const MYSQL_RESPONSE_CODE_ERR: u8 = 0xff;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    Sleep = 0x00,
    Quit = 0x01,
    InitDb = 0x02,
    Query = 0x03,
    FieldList = 0x04,
    CreateDb = 0x05,
    DropDb = 0x06,
    Refresh = 0x07,
    Shutdown = 0x08,
    Statistics = 0x09,
    ProcessInfo = 0x0a,
    Connect = 0x0b,
    ProcessKill = 0x0c,
    Debug = 0x0d,
    Ping = 0x0e,
    Time = 0x0f,
    DelayedInsert = 0x10,
    ChangeUser = 0x11,
    BinlogDump = 0x12,
    TableDump = 0x13,
    ConnectOut = 0x14,
    RegisterSlave = 0x15,
    StmtPrepare = 0x16,
    StmtExecute = 0x17,
    StmtSendLongData = 0x18,
    StmtClose = 0x19,
    StmtReset = 0x1a,
    SetOption = 0x1b,
    StmtFetch = 0x1c,
    Daemon = 0x1d,
    BinlogDumpGtid = 0x1e,
    ResetConnection = 0x1f,
    // MariaDB
    StmtBulkExecute = 0xfa,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sleep => "COM_SLEEP",
            Self::Quit => "COM_QUIT",
            Self::InitDb => "COM_INIT_DB",
            Self::Query => "COM_QUERY",
            Self::FieldList => "COM_FIELD_LIST",
            Self::CreateDb => "COM_CREATE_DB",
            Self::DropDb => "COM_DROP_DB",
            Self::Refresh => "COM_REFRESH",
            Self::Shutdown => "COM_SHUTDOWN",
            Self::Statistics => "COM_STATISTICS",
            Self::ProcessInfo => "COM_PROCESS_INFO",
            Self::Connect => "COM_CONNECT",
            Self::ProcessKill => "COM_PROCESS_KILL",
            Self::Debug => "COM_DEBUG",
            Self::Ping => "COM_PING",
            Self::Time => "COM_TIME",
            Self::DelayedInsert => "COM_DELAYED_INSERT",
            Self::ChangeUser => "COM_CHANGE_USER",
            Self::BinlogDump => "COM_BINLOG_DUMP",
            Self::TableDump => "COM_TABLE_DUMP",
            Self::ConnectOut => "COM_CONNECT_OUT",
            Self::RegisterSlave => "COM_REGISTER_SLAVE",
            Self::StmtPrepare => "COM_STMT_PREPARE",
            Self::StmtExecute => "COM_STMT_EXECUTE",
            Self::StmtSendLongData => "COM_STMT_SEND_LONG_DATA",
            Self::StmtClose => "COM_STMT_CLOSE",
            Self::StmtReset => "COM_STMT_RESET",
            Self::SetOption => "COM_SET_OPTION",
            Self::StmtFetch => "COM_STMT_FETCH",
            Self::Daemon => "COM_DAEMON",
            Self::BinlogDumpGtid => "COM_BINLOG_DUMP_GTID",
            Self::ResetConnection => "COM_RESET_CONNECTION",
            Self::StmtBulkExecute => "COM_STMT_BULK_EXECUTE",
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    Longlong = 0x08,
    Int24 = 0x09,
    Date = 0x0a,
    Time = 0x0b,
    Datetime = 0x0c,
    Year = 0x0d,
    NewDate = 0x0e,
    Varchar = 0x0f,
    Bit = 0x10,
    Timestamp2 = 0x11,
    Datetime2 = 0x12,
    Time2 = 0x13,
    TypedArray = 0x14,
    Vector = 0xf2,
    Invalid = 0xf3,
    Bool = 0xf4,
    Json = 0xf5,
    NewDecimal = 0xf6,
    Enum = 0xf7,
    Set = 0xf8,
    TinyBlob = 0xf9,
    MediumBlob = 0xfa,
    LongBlob = 0xfb,
    Blob = 0xfc,
    VarString = 0xfd,
    String = 0xfe,
    Geometry = 0xff,
}

impl FieldType {
    pub fn name(code: u8) -> &'static str {
        match FieldType::try_from(code) {
            Ok(t) => t.as_str(),
            Err(_) => "UNKNOWN",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decimal => "DECIMAL",
            Self::Tiny => "TINY",
            Self::Short => "SHORT",
            Self::Long => "LONG",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Null => "NULL",
            Self::Timestamp => "TIMESTAMP",
            Self::Longlong => "LONGLONG",
            Self::Int24 => "INT24",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Datetime => "DATETIME",
            Self::Year => "YEAR",
            Self::NewDate => "NEWDATE",
            Self::Varchar => "VARCHAR",
            Self::Bit => "BIT",
            Self::Timestamp2 => "TIMESTAMP2",
            Self::Datetime2 => "DATETIME2",
            Self::Time2 => "TIME2",
            Self::TypedArray => "TYPED_ARRAY",
            Self::Vector => "VECTOR",
            Self::Invalid => "INVALID",
            Self::Bool => "BOOL",
            Self::Json => "JSON",
            Self::NewDecimal => "NEWDECIMAL",
            Self::Enum => "ENUM",
            Self::Set => "SET",
            Self::TinyBlob => "TINY_BLOB",
            Self::MediumBlob => "MEDIUM_BLOB",
            Self::LongBlob => "LONG_BLOB",
            Self::Blob => "BLOB",
            Self::VarString => "VAR_STRING",
            Self::String => "STRING",
            Self::Geometry => "GEOMETRY",
        }
    }
}

bitflags! {
    #[derive(Default)]
    pub struct Capabilities: u16 {
        const LONG_PASSWORD = 1 << 0;
        const FOUND_ROWS = 1 << 1;
        const LONG_FLAG = 1 << 2;
        const CONNECT_WITH_DB = 1 << 3;
        const NO_SCHEMA = 1 << 4;
        const COMPRESS = 1 << 5;
        const ODBC = 1 << 6;
        const LOCAL_FILES = 1 << 7;
        const IGNORE_SPACE = 1 << 8;
        const PROTOCOL_41 = 1 << 9;
        const INTERACTIVE = 1 << 10;
        const SSL = 1 << 11;
        const IGNORE_SIGPIPE = 1 << 12;
        const TRANSACTIONS = 1 << 13;
        const RESERVED = 1 << 14;
        const SECURE_CONNECTION = 1 << 15;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct ExtCapabilities: u16 {
        const MULTI_STATEMENTS = 1 << 0;
        const MULTI_RESULTS = 1 << 1;
        const PS_MULTI_RESULTS = 1 << 2;
        const PLUGIN_AUTH = 1 << 3;
        const CONNECT_ATTRS = 1 << 4;
        const PLUGIN_AUTH_LENENC_CLIENT_DATA = 1 << 5;
        const CAN_HANDLE_EXPIRED_PASSWORDS = 1 << 6;
        const SESSION_TRACK = 1 << 7;
        const DEPRECATE_EOF = 1 << 8;
        const OPTIONAL_RESULTSET_METADATA = 1 << 9;
        const ZSTD_COMPRESSION_ALGORITHM = 1 << 10;
        const QUERY_ATTRIBUTES = 1 << 11;
        const MULTI_FACTOR_AUTHENTICATION = 1 << 12;
        const CAPABILITY_EXTENSION = 1 << 13;
        const SSL_VERIFY_SERVER_CERT = 1 << 14;
        const REMEMBER_OPTIONS = 1 << 15;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct MariadbCapabilities: u32 {
        const PROGRESS = 1 << 0;
        const COM_MULTI = 1 << 1;
        const STMT_BULK_OPERATIONS = 1 << 2;
        const EXTENDED_TYPE_INFO = 1 << 3;
        const CACHE_METADATA = 1 << 4;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct ServerStatus: u16 {
        const IN_TRANS = 0x0001;
        const AUTOCOMMIT = 0x0002;
        const MORE_RESULTS_EXISTS = 0x0008;
        const NO_GOOD_INDEX_USED = 0x0010;
        const NO_INDEX_USED = 0x0020;
        const CURSOR_EXISTS = 0x0040;
        const LAST_ROW_SENT = 0x0080;
        const DB_DROPPED = 0x0100;
        const NO_BACKSLASH_ESCAPES = 0x0200;
        const METADATA_CHANGED = 0x0400;
        const QUERY_WAS_SLOW = 0x0800;
        const PS_OUT_PARAMS = 0x1000;
        const IN_TRANS_READONLY = 0x2000;
        const SESSION_STATE_CHANGED = 0x4000;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct FieldFlags: u16 {
        const NOT_NULL = 0x0001;
        const PRI_KEY = 0x0002;
        const UNIQUE_KEY = 0x0004;
        const MULTIPLE_KEY = 0x0008;
        const BLOB = 0x0010;
        const UNSIGNED = 0x0020;
        const ZEROFILL = 0x0040;
        const BINARY = 0x0080;
        const ENUM = 0x0100;
        const AUTO_INCREMENT = 0x0200;
        const TIMESTAMP = 0x0400;
        const SET = 0x0800;
    }
}

pub const CAPABILITY_BITS: &[(u32, &str)] = &[
    (1 << 0, "long_password"),
    (1 << 1, "found_rows"),
    (1 << 2, "long_flag"),
    (1 << 3, "connect_with_db"),
    (1 << 4, "no_schema"),
    (1 << 5, "compress"),
    (1 << 6, "odbc"),
    (1 << 7, "local_files"),
    (1 << 8, "ignore_space"),
    (1 << 9, "protocol_41"),
    (1 << 10, "interactive"),
    (1 << 11, "ssl"),
    (1 << 12, "ignore_sigpipe"),
    (1 << 13, "transactions"),
    (1 << 14, "reserved"),
    (1 << 15, "secure_connection"),
];

pub const EXT_CAPABILITY_BITS: &[(u32, &str)] = &[
    (1 << 0, "multi_statements"),
    (1 << 1, "multi_results"),
    (1 << 2, "ps_multi_results"),
    (1 << 3, "plugin_auth"),
    (1 << 4, "connect_attrs"),
    (1 << 5, "plugin_auth_lenenc_data"),
    (1 << 6, "expired_password_aware"),
    (1 << 7, "session_track"),
    (1 << 8, "deprecate_eof"),
    (1 << 9, "optional_resultset_metadata"),
    (1 << 10, "zstd_compression"),
    (1 << 11, "query_attributes"),
    (1 << 12, "multi_factor_auth"),
    (1 << 13, "capability_extension"),
];

pub const MARIADB_CAPABILITY_BITS: &[(u32, &str)] = &[
    (1 << 0, "progress"),
    (1 << 1, "com_multi"),
    (1 << 2, "stmt_bulk_operations"),
    (1 << 3, "extended_type_info"),
    (1 << 4, "cache_metadata"),
];

pub const SERVER_STATUS_BITS: &[(u32, &str)] = &[
    (0x0001, "in_transaction"),
    (0x0002, "autocommit"),
    (0x0008, "more_results"),
    (0x0010, "bad_index_used"),
    (0x0020, "no_index_used"),
    (0x0040, "cursor_exists"),
    (0x0080, "last_row_sent"),
    (0x0100, "db_dropped"),
    (0x0200, "no_backslash_escapes"),
    (0x0400, "metadata_changed"),
    (0x0800, "query_was_slow"),
    (0x1000, "ps_out_params"),
    (0x2000, "in_trans_readonly"),
    (0x4000, "session_state_changed"),
];

pub const FIELD_FLAG_BITS: &[(u32, &str)] = &[
    (0x0001, "not_null"),
    (0x0002, "primary_key"),
    (0x0004, "unique_key"),
    (0x0008, "multiple_key"),
    (0x0010, "blob"),
    (0x0020, "unsigned"),
    (0x0040, "zero_fill"),
    (0x0080, "binary"),
    (0x0100, "enum"),
    (0x0200, "auto_increment"),
    (0x0400, "timestamp"),
    (0x0800, "set"),
];

pub const REFRESH_BITS: &[(u32, &str)] = &[
    (0x01, "grant"),
    (0x02, "log"),
    (0x04, "tables"),
    (0x08, "hosts"),
    (0x10, "status"),
    (0x20, "threads"),
    (0x40, "slave"),
    (0x80, "master"),
];

pub const SHUTDOWN_LEVELS: &[(u64, &str)] = &[
    (0, "default"),
    (1, "wait_connections"),
    (2, "wait_transactions"),
    (8, "wait_updates"),
    (16, "wait_all_buffers"),
    (17, "wait_critical_buffers"),
    (254, "kill_query"),
    (255, "kill_connection"),
];

pub const SET_OPTIONS: &[(u64, &str)] = &[
    (0, "multi_statements_on"),
    (1, "multi_statements_off"),
];

pub const CURSOR_TYPES: &[(u64, &str)] = &[
    (0x00, "no_cursor"),
    (0x01, "read_only"),
    (0x02, "for_update"),
    (0x04, "scrollable"),
    (0x08, "parameter_count_available"),
];

pub const SESSION_TRACK_TYPES: &[(u64, &str)] = &[
    (0, "system_variables"),
    (1, "schema"),
    (2, "state_change"),
    (3, "gtids"),
    (4, "transaction_characteristics"),
    (5, "transaction_state"),
];

pub const BULK_INDICATORS: &[(u64, &str)] = &[
    (BULK_INDICATOR_NONE as u64, "none"),
    (BULK_INDICATOR_NULL as u64, "null"),
    (BULK_INDICATOR_DEFAULT as u64, "default"),
    (BULK_INDICATOR_IGNORE as u64, "ignore"),
];

pub const BINLOG_EVENT_TYPES: &[(u64, &str)] = &[
    (0x02, "query_event"),
    (0x04, "rotate_event"),
    (0x0f, "format_description_event"),
    (0x10, "xid_event"),
    (0x13, "table_map_event"),
    (0x1b, "heartbeat_event"),
    (0x1e, "write_rows_event"),
    (0x1f, "update_rows_event"),
    (0x20, "delete_rows_event"),
    (0x21, "gtid_event"),
    (0x22, "anonymous_gtid_event"),
    (0x23, "previous_gtids_event"),
];

pub fn lookup_name(table: &[(u64, &'static str)], value: u64) -> &'static str {
    table
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, name)| *name)
        .unwrap_or("unknown")
}
