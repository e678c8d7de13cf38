//! Thread-backed codec service.
//!
//! Runs the codec off the interactive thread so an O(width x height) encode
//! of a large board never stalls input handling. Strictly request/response:
//! each request carries a full snapshot, responses come back tagged with the
//! request id, and a superseded response is simply skipped by the caller.
//! There is no cancellation; one outstanding request per operation type is
//! all a caller needs.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use mineshare_protocol::{CodecRequest, CodecResponse};
use thiserror::Error;

pub type RequestId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Codec worker is gone")]
    Disconnected,
}

pub type Result<T> = core::result::Result<T, WorkerError>;

/// Synchronous dispatch of one request; the worker thread's whole job.
pub fn handle_request(request: &CodecRequest) -> CodecResponse {
    match request {
        CodecRequest::Encode { board } => match mineshare_core::encode(board) {
            Ok(board_id) => CodecResponse::Encoded { board_id },
            Err(err) => CodecResponse::Failed {
                message: err.to_string(),
            },
        },
        CodecRequest::Decode { board_id } => match mineshare_core::decode(board_id) {
            Ok(board) => CodecResponse::Decoded { board },
            Err(err) => CodecResponse::Failed {
                message: err.to_string(),
            },
        },
        CodecRequest::Stats { board } => match mineshare_core::stats(board) {
            Ok(stats) => CodecResponse::Stats { stats },
            Err(err) => CodecResponse::Failed {
                message: err.to_string(),
            },
        },
    }
}

struct Envelope {
    id: RequestId,
    request: CodecRequest,
}

/// Handle to the codec thread. Dropping it shuts the thread down.
pub struct CodecWorker {
    requests: Option<Sender<Envelope>>,
    responses: Receiver<(RequestId, CodecResponse)>,
    next_id: RequestId,
    handle: Option<JoinHandle<()>>,
}

impl CodecWorker {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<Envelope>();
        let (response_tx, response_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            while let Ok(Envelope { id, request }) = request_rx.recv() {
                log::debug!("codec worker handling request {id}");
                let response = handle_request(&request);
                if response_tx.send((id, response)).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: Some(request_tx),
            responses: response_rx,
            next_id: 0,
            handle: Some(handle),
        }
    }

    /// Queues a request, returning the id its response will carry.
    pub fn submit(&mut self, request: CodecRequest) -> Result<RequestId> {
        let id = self.next_id;
        self.next_id += 1;
        self.requests
            .as_ref()
            .ok_or(WorkerError::Disconnected)?
            .send(Envelope { id, request })
            .map_err(|_| WorkerError::Disconnected)?;
        Ok(id)
    }

    /// Next finished response, if any.
    pub fn poll(&mut self) -> Option<(RequestId, CodecResponse)> {
        self.responses.try_recv().ok()
    }

    /// Blocks until the response for `id` arrives, skipping superseded ones.
    pub fn recv(&mut self, id: RequestId) -> Result<CodecResponse> {
        loop {
            let (got, response) = self
                .responses
                .recv()
                .map_err(|_| WorkerError::Disconnected)?;
            if got == id {
                return Ok(response);
            }
            log::debug!("skipping superseded response {got}");
        }
    }

    /// Submit-and-wait convenience for synchronous callers.
    pub fn request(&mut self, request: CodecRequest) -> Result<CodecResponse> {
        let id = self.submit(request)?;
        self.recv(id)
    }
}

impl Drop for CodecWorker {
    fn drop(&mut self) {
        // closing the request channel ends the worker loop
        drop(self.requests.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
