use reqwest::{Client, Error};
use std::time::Duration;

pub struct HttpClient;

impl HttpClient {
    pub const USER_AGENT: &'static str = "Mozilla/5.0 (compatible; LinkGate/0.1.0)";

    /// Builds the shared upstream client. No blanket request timeout: range
    /// fetches backing multi-GiB streams can legitimately run for minutes: a
    /// per-idle-write timeout belongs at the streamer, not the transport.
    pub fn new() -> Result<Client, Error> {
        Client::builder()
            .user_agent(Self::USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
    }
}
