use num_derive::{FromPrimitive, ToPrimitive};

// see: https://dev.mysql.com/doc/refman/8.0/en/identifier-length.html
// max packet payload length.
pub const MAX_PAYLOAD_LEN: usize = 16_777_215;

pub const PACKET_HEADER_LEN: usize = 4;

/// [MYSQL_PACKET_LENGTH_MAX] is the payload length on the wire that signals a
/// large-packet continuation: the logical packet carries on in the next framed unit.
pub const MYSQL_PACKET_LENGTH_MAX: u32 = 0xFF_FFFF;

/// bits at offset 3 of an EOF packet's payload, little-endian u16.
pub const SERVER_MORE_RESULTS_EXIST: u16 = 0x0008;

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum CommandCode {
    ComSleep = 0,
    ComQuit,
    ComInitDB,
    ComQuery,
    ComFieldList,
    ComCreateDB,
    ComDropDB,
    ComRefresh,
    ComShutdown,
    ComStatistics,
    ComProcessInfo,
    ComConnect,
    ComProcessKill,
    ComDebug,
    ComPing,
    ComTime,
    ComDelayedInsert,
    ComChangeUser,
    ComBinlogDump,
    ComTableDump,
    ComConnectOut,
    ComRegisterSlave,
    ComStmtPrepare,
    ComStmtExecute,
    ComStmtSendLongData,
    ComStmtClose,
    ComStmtReset,
    ComSetOption,
    ComStmtFetch,
    ComDaemon,
    ComBinlogDumpGtid,
    ComResetConnection,
    ComEnd,
}
