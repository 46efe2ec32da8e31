use std::error::Error as _;
use std::io;
use std::time::Duration;

use crate::error::FetchError;

/// Connect and read limits for a single catalog request.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

fn body_excerpt(response: ureq::Response) -> String {
    let response_body = response.into_string().ok().unwrap_or_default();
    response_body.trim().chars().take(240).collect::<String>()
}

fn is_timeout(err: &ureq::Transport) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            )
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Single GET with bounded timeouts. No retries: a failure is reported as-is.
pub(crate) fn get_text(
    url: &str,
    query: &[(String, String)],
    timeouts: Timeouts,
) -> Result<String, FetchError> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(timeouts.connect)
        .timeout_read(timeouts.read)
        .timeout_write(timeouts.read)
        .build();

    let mut request = agent.get(url).set("Accept", "application/json");
    for (key, value) in query {
        request = request.query(key, value);
    }

    match request.call() {
        Ok(response) => response.into_string().map_err(|err| {
            if err.kind() == io::ErrorKind::TimedOut || err.kind() == io::ErrorKind::WouldBlock {
                FetchError::Timeout(format!("{url}: {err}"))
            } else {
                FetchError::MalformedResponse(format!("response decode failed: {err}"))
            }
        }),
        Err(ureq::Error::Status(404, _)) => Err(FetchError::NotFound(url.to_string())),
        Err(ureq::Error::Status(status, response)) => Err(FetchError::Http {
            status,
            detail: body_excerpt(response),
        }),
        Err(ureq::Error::Transport(err)) => {
            if is_timeout(&err) {
                Err(FetchError::Timeout(format!("{url}: {err}")))
            } else {
                Err(FetchError::Network(format!("{url}: {err}")))
            }
        }
    }
}
