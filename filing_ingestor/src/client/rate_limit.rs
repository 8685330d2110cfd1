use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use tracing::{debug, warn};

use super::{ClientError, Request, Response, Transport};

/// EDGAR marks throttled callers with a 403 carrying this phrase in the body.
const EDGAR_THROTTLE_MARKER: &str = "Request Rate Threshold Exceeded";

/// Retry and backoff settings for a [`RateLimitedClient`].
///
/// Throttle responses (429, or 403 with the EDGAR threshold marker) back off
/// exponentially: `min(throttle_cap, throttle_base * 2^attempt)`. Other
/// retryable failures back off linearly: `transient_delay * (attempt + 1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Base delay for the exponential throttle backoff.
    pub throttle_base: Duration,
    /// Upper bound on any single throttle backoff sleep.
    pub throttle_cap: Duration,
    /// Unit delay for the linear transient backoff.
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            throttle_base: Duration::from_secs(2),
            throttle_cap: Duration::from_secs(60),
            transient_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn throttle_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.throttle_base
            .saturating_mul(factor)
            .min(self.throttle_cap)
    }

    fn transient_backoff(&self, attempt: u32) -> Duration {
        self.transient_delay.saturating_mul(attempt + 1)
    }
}

/// Request executor enforcing a minimum inter-request interval and bounded
/// retries.
///
/// One instance wraps one external API; the limiter inside it is the single
/// coordination point for that API's quota, so callers must share the
/// instance rather than construct one per task. Callers block (await) until
/// the limiter admits the request.
pub struct RateLimitedClient<T> {
    transport: T,
    limiter: DefaultDirectRateLimiter,
    policy: RetryPolicy,
}

impl<T: Transport> RateLimitedClient<T> {
    /// Wraps `transport` with a minimum interval between request starts.
    pub fn with_min_interval(transport: T, interval: Duration, policy: RetryPolicy) -> Self {
        let quota = Quota::with_period(interval).unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));
        Self {
            transport,
            limiter: RateLimiter::direct(quota),
            policy,
        }
    }

    /// Executes `request`, retrying per the configured [`RetryPolicy`].
    ///
    /// A 404 response is returned as a normal result. Exhausting retries
    /// yields [`ClientError::RequestFailed`] with the last status seen, or
    /// the final transport error when no status was ever observed.
    pub async fn execute(&self, request: &Request) -> Result<Response, ClientError> {
        let attempts = self.policy.max_retries + 1;
        let mut last_status: Option<u16> = None;
        let mut last_transport_err = None;

        for attempt in 0..attempts {
            self.limiter.until_ready().await;
            debug!(url = %request.url, attempt = attempt + 1, "executing request");

            match self.transport.execute(request).await {
                Ok(response) => {
                    if response.is_not_found() {
                        debug!(url = %request.url, "resource not found");
                        return Ok(response);
                    }
                    if response.is_success() {
                        return Ok(response);
                    }

                    last_status = Some(response.status);
                    let delay = if is_throttled(&response) {
                        warn!(
                            url = %request.url,
                            status = response.status,
                            "throttled, backing off"
                        );
                        self.policy.throttle_delay(attempt)
                    } else {
                        warn!(
                            url = %request.url,
                            status = response.status,
                            "request failed, retrying"
                        );
                        self.policy.transient_backoff(attempt)
                    };
                    if attempt + 1 < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    warn!(url = %request.url, error = %err, "transport error");
                    last_transport_err = Some(err);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.policy.transient_backoff(attempt)).await;
                    }
                }
            }
        }

        match (last_status, last_transport_err) {
            (Some(status), _) => Err(ClientError::RequestFailed { status, attempts }),
            (None, Some(err)) => Err(ClientError::Transport(err)),
            // Unreachable: every attempt records a status or a transport error.
            (None, None) => Err(ClientError::RequestFailed { status: 0, attempts }),
        }
    }
}

fn is_throttled(response: &Response) -> bool {
    response.status == 429
        || (response.status == 403 && response.body.contains(EDGAR_THROTTLE_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            throttle_base: Duration::from_secs(2),
            throttle_cap: Duration::from_secs(10),
            transient_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.throttle_delay(0), Duration::from_secs(2));
        assert_eq!(policy.throttle_delay(1), Duration::from_secs(4));
        assert_eq!(policy.throttle_delay(2), Duration::from_secs(8));
        assert_eq!(policy.throttle_delay(3), Duration::from_secs(10));
        assert_eq!(policy.throttle_delay(4), Duration::from_secs(10));
    }

    #[test]
    fn transient_backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.transient_backoff(0), Duration::from_secs(1));
        assert_eq!(policy.transient_backoff(2), Duration::from_secs(3));
    }

    #[test]
    fn throttle_detection_needs_marker_on_403() {
        let plain_403 = Response {
            status: 403,
            body: "forbidden".into(),
        };
        assert!(!is_throttled(&plain_403));

        let marked = Response {
            status: 403,
            body: format!("<html>{EDGAR_THROTTLE_MARKER}</html>"),
        };
        assert!(is_throttled(&marked));

        let too_many = Response {
            status: 429,
            body: String::new(),
        };
        assert!(is_throttled(&too_many));
    }
}
