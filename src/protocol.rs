//! Messages crossing the extension boundaries.
//!
//! Outbound messages go from the page agent to the background process,
//! commands come in from the popup. Both are tagged by `action` so every
//! message kind is matched exhaustively.

use serde::{Deserialize, Serialize};

use crate::scan::{ScanReport, ScanSnapshot};
use crate::scope::DateRange;

/// Ad count of one advertiser, as returned by the background process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub count: u64,
    pub url: String,
}

/// Request to count an advertiser's ads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAdvertiser {
    pub advertiser: String,
    pub country: String,
    pub date_range: DateRange,
}

/// Scan progress, sent after every processed card and once at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub checked: usize,
    pub high_count: usize,
    pub low_count: usize,
    pub total: usize,
    pub current: usize,
}

/// Messages the page agent sends to the background process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundMessage {
    CheckAdvertiser(CheckAdvertiser),
    UpdateProgress(ProgressUpdate),
}

/// Background reply to [`CheckAdvertiser`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckAdvertiserResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<LookupResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckAdvertiserResponse {
    #[must_use]
    pub fn found(result: LookupResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// The result if the response is a success that carries one.
    #[must_use]
    pub fn into_result(self) -> Option<LookupResult> {
        if self.success {
            self.result
        } else {
            None
        }
    }
}

/// Commands from the popup UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Start a scan, or resume a paused one.
    CheckAdvertisers,
    PauseChecking,
    ResumeChecking,
    GetStatus,
    /// Filter now and click every visible see-more control.
    ManualFilter,
}

/// Result of a manual filter command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualFilterReport {
    pub shown: usize,
    pub hidden: usize,
    pub see_more_clicked: usize,
}

/// Replies to [`Command`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    Scan {
        success: bool,
        #[serde(flatten)]
        report: ScanReport,
    },
    Status(ScanSnapshot),
    Filter {
        success: bool,
        #[serde(flatten)]
        report: ManualFilterReport,
    },
    Ack {
        success: bool,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl CommandReply {
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            error: error.into(),
        }
    }
}
