//! Request/response types for the codec boundary.
//!
//! Every message carries a full, immutable snapshot. No shared state crosses
//! the boundary, which is what keeps the worker side lock-free.

use mineshare_core::{BoardInfo, CodecStats};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CodecRequest {
    Encode { board: BoardInfo },
    Decode { board_id: String },
    Stats { board: BoardInfo },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CodecResponse {
    Encoded { board_id: String },
    Decoded { board: BoardInfo },
    Stats { stats: CodecStats },
    Failed { message: String },
}

impl CodecResponse {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
