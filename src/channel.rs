//! Message-passing boundary to the background process.
//!
//! The page agent never counts ads itself. It sends a [`CheckAdvertiser`]
//! request and awaits the reply, and it fires progress updates without
//! waiting for anything. [`pair`] builds both ends on tokio channels; the
//! background side answers through [`BackgroundEndpoint::serve`].

use async_trait::async_trait;
use log::debug;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{CheckAdvertiser, CheckAdvertiserResponse, ProgressUpdate};
use crate::{Error, Result};

/// What the scan needs from the background process.
#[async_trait(?Send)]
pub trait BackgroundChannel {
    /// Ask for an advertiser's ad count and wait for the answer.
    async fn check_advertiser(&self, request: CheckAdvertiser) -> Result<CheckAdvertiserResponse>;

    /// Report progress. Delivery is not awaited; callers ignore failures.
    fn send_progress(&self, update: ProgressUpdate) -> Result<()>;
}

/// A lookup request together with its reply slot.
#[derive(Debug)]
pub struct Envelope {
    pub request: CheckAdvertiser,
    reply: oneshot::Sender<CheckAdvertiserResponse>,
}

impl Envelope {
    /// Answer the request. A requester that gave up is not an error.
    pub fn respond(self, response: CheckAdvertiserResponse) {
        if self.reply.send(response).is_err() {
            debug!("lookup requester went away before the reply");
        }
    }
}

/// Page-side end of the boundary.
#[derive(Debug, Clone)]
pub struct MessageChannel {
    requests: mpsc::UnboundedSender<Envelope>,
    progress: mpsc::UnboundedSender<ProgressUpdate>,
}

/// Background-side end of the boundary.
#[derive(Debug)]
pub struct BackgroundEndpoint {
    requests: mpsc::UnboundedReceiver<Envelope>,
    /// Progress updates, for whoever shows them (the popup).
    pub progress: mpsc::UnboundedReceiver<ProgressUpdate>,
}

/// Create a connected page/background pair.
#[must_use]
pub fn pair() -> (MessageChannel, BackgroundEndpoint) {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (prog_tx, prog_rx) = mpsc::unbounded_channel();
    (
        MessageChannel {
            requests: req_tx,
            progress: prog_tx,
        },
        BackgroundEndpoint {
            requests: req_rx,
            progress: prog_rx,
        },
    )
}

#[async_trait(?Send)]
impl BackgroundChannel for MessageChannel {
    async fn check_advertiser(&self, request: CheckAdvertiser) -> Result<CheckAdvertiserResponse> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Envelope { request, reply })
            .map_err(|_| Error::ChannelClosed)?;
        response.await.map_err(|_| Error::ChannelClosed)
    }

    fn send_progress(&self, update: ProgressUpdate) -> Result<()> {
        self.progress.send(update).map_err(|_| Error::ChannelClosed)
    }
}

impl BackgroundEndpoint {
    /// Next pending lookup request, or `None` once the page side is gone.
    pub async fn next_request(&mut self) -> Option<Envelope> {
        self.requests.recv().await
    }

    /// Answer lookup requests with `handler` until the page side is dropped.
    /// Returns the number of requests served.
    pub async fn serve<F>(mut self, mut handler: F) -> usize
    where
        F: FnMut(&CheckAdvertiser) -> CheckAdvertiserResponse,
    {
        let mut served = 0;
        while let Some(envelope) = self.next_request().await {
            let response = handler(&envelope.request);
            envelope.respond(response);
            served += 1;
        }
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LookupResult;
    use crate::scope::DateRange;

    fn request(name: &str) -> CheckAdvertiser {
        CheckAdvertiser {
            advertiser: name.to_string(),
            country: "BR".to_string(),
            date_range: DateRange::default(),
        }
    }

    #[tokio::test]
    async fn test_request_reply_roundtrip() {
        let (channel, endpoint) = pair();
        let server = tokio::spawn(endpoint.serve(|req| {
            CheckAdvertiserResponse::found(LookupResult {
                count: req.advertiser.len() as u64,
                url: format!("https://example.test/{}", req.advertiser),
            })
        }));

        let resp = channel.check_advertiser(request("coolbrand")).await.expect("reply");
        assert_eq!(resp.into_result().map(|r| r.count), Some(9));

        drop(channel);
        assert_eq!(server.await.expect("server task"), 1);
    }

    #[tokio::test]
    async fn test_closed_endpoint_is_error() {
        let (channel, endpoint) = pair();
        drop(endpoint);

        assert!(matches!(
            channel.check_advertiser(request("coolbrand")).await,
            Err(Error::ChannelClosed)
        ));
        assert!(channel.send_progress(ProgressUpdate::default()).is_err());
    }

    #[tokio::test]
    async fn test_dropped_envelope_is_error() {
        let (channel, mut endpoint) = pair();
        let server = tokio::spawn(async move {
            // Receive and drop without answering.
            let _ = endpoint.next_request().await;
        });

        assert!(matches!(
            channel.check_advertiser(request("coolbrand")).await,
            Err(Error::ChannelClosed)
        ));
        server.await.expect("server task");
    }
}
