//! Payment-status polling with a soft and a hard timeout.

use crate::checkout::payment::{PaymentStatus, PaymentStatusSource};
use crate::error::{Error, Result};
use crate::logger::Logger;
use std::time::Duration;

/// Poll cadence. Elapsed time is the sum of intervals slept, so a poll run
/// is reproducible regardless of how long each status read takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Past this, a warning is logged once and polling continues.
    pub soft_timeout: Duration,
    /// Past this, polling stops.
    pub hard_timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, soft_timeout: Duration, hard_timeout: Duration) -> Self {
        PollPolicy {
            interval,
            soft_timeout,
            hard_timeout,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::ConfigError(
                "Poll interval must be greater than zero".to_string(),
            ));
        }
        if self.soft_timeout > self.hard_timeout {
            return Err(Error::ConfigError(format!(
                "Soft timeout {:?} exceeds hard timeout {:?}",
                self.soft_timeout, self.hard_timeout
            )));
        }
        Ok(())
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::new(
            Duration::from_secs(3),
            Duration::from_secs(120),
            Duration::from_secs(600),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Processor left Pending.
    Settled { status: PaymentStatus, attempts: u32 },
    /// Still pending at the hard timeout.
    TimedOut { attempts: u32 },
}

/// Read the status of `reference` until it leaves `Pending` or the hard
/// timeout passes. Read errors are logged and retried like a pending read.
pub fn poll_payment<S, F>(
    source: &S,
    reference: &str,
    policy: &PollPolicy,
    mut sleep: F,
) -> Result<PollOutcome>
where
    S: PaymentStatusSource + ?Sized,
    F: FnMut(Duration),
{
    policy.validate()?;

    let mut elapsed = Duration::ZERO;
    let mut attempts = 0u32;
    let mut warned = false;

    loop {
        attempts += 1;
        match source.payment_status(reference) {
            Ok(PaymentStatus::Pending) => {}
            Ok(status) => return Ok(PollOutcome::Settled { status, attempts }),
            Err(e) => Logger::warn(&format!("status read for {} failed: {}", reference, e)),
        }

        if elapsed >= policy.hard_timeout {
            Logger::warn(&format!(
                "payment {} still pending after {:?}, giving up",
                reference, elapsed
            ));
            return Ok(PollOutcome::TimedOut { attempts });
        }
        if !warned && elapsed >= policy.soft_timeout {
            Logger::warn(&format!(
                "payment {} still pending after {:?}",
                reference, elapsed
            ));
            warned = true;
        }

        sleep(policy.interval);
        elapsed += policy.interval;
    }
}
