//! Payment processor seam.
//!
//! The gateway's wire protocol lives outside this crate. A processor only
//! has to hand back a reference plus a payment URL (or an immediate
//! confirmation), and report a status for a reference later.

use crate::error::{Error, Result};
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Status reported by the processor for a payment reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: String,
    pub customer_id: String,
    pub amount: Money,
    pub description: String,
}

/// Result of creating a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentInit {
    /// Customer must pay at `payment_url`; confirmation arrives later.
    Pending {
        reference: String,
        payment_url: String,
    },
    /// Processor captured the payment synchronously.
    Confirmed { reference: String },
}

pub trait PaymentStatusSource {
    fn payment_status(&self, reference: &str) -> Result<PaymentStatus>;
}

pub trait PaymentProcessor: PaymentStatusSource {
    fn create_payment(&mut self, request: &PaymentRequest) -> Result<PaymentInit>;
}

/// Offline PIX stand-in: issues deterministic references and keeps
/// statuses until something (a webhook, an operator) sets them.
///
/// With a store file attached, statuses are written through as JSON and
/// re-read on every status query, so a separate process can settle a
/// payment while another one waits on it.
#[derive(Debug, Clone)]
pub struct OfflinePixProcessor {
    base_url: String,
    statuses: HashMap<String, PaymentStatus>,
    store: Option<PathBuf>,
}

impl OfflinePixProcessor {
    pub fn new(base_url: &str) -> Self {
        OfflinePixProcessor {
            base_url: base_url.trim_end_matches('/').to_string(),
            statuses: HashMap::new(),
            store: None,
        }
    }

    /// Processor backed by a JSON status file. A missing file starts empty.
    pub fn with_store(base_url: &str, path: PathBuf) -> Result<Self> {
        let statuses = read_statuses(&path)?;
        Ok(OfflinePixProcessor {
            statuses,
            store: Some(path),
            ..OfflinePixProcessor::new(base_url)
        })
    }

    /// Reference derived from booking id and amount.
    pub fn reference_for(booking_id: &str, amount: Money) -> String {
        let digest = crate::hex_digest(format!("{}:{}", booking_id, amount.cents()).as_bytes());
        format!("pix_{}", &digest[..20])
    }

    pub fn set_status(&mut self, reference: &str, status: PaymentStatus) -> Result<()> {
        self.refresh()?;
        let slot = self
            .statuses
            .get_mut(reference)
            .ok_or_else(|| Error::PaymentError(format!("Unknown payment reference {}", reference)))?;
        *slot = status;
        self.write_through()
    }

    fn refresh(&mut self) -> Result<()> {
        if let Some(path) = &self.store {
            self.statuses = read_statuses(path)?;
        }
        Ok(())
    }

    /// Atomic replace of the store file: write temp, fsync, rename.
    fn write_through(&self) -> Result<()> {
        let Some(path) = &self.store else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::PaymentError(format!("Failed to create payment store directory: {}", e))
            })?;
        }
        let data = serde_json::to_vec_pretty(&self.statuses)
            .map_err(|e| Error::PaymentError(format!("Failed to serialize payments: {}", e)))?;

        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp)
            .map_err(|e| Error::PaymentError(format!("Failed to create payment store: {}", e)))?;
        file.write_all(&data)
            .map_err(|e| Error::PaymentError(format!("Failed to write payment store: {}", e)))?;
        file.sync_all()
            .map_err(|e| Error::PaymentError(format!("Failed to fsync payment store: {}", e)))?;
        drop(file);
        fs::rename(&tmp, path)
            .map_err(|e| Error::PaymentError(format!("Failed to rename payment store: {}", e)))
    }
}

fn read_statuses(path: &Path) -> Result<HashMap<String, PaymentStatus>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let data = fs::read(path)
        .map_err(|e| Error::PaymentError(format!("Failed to read payment store: {}", e)))?;
    serde_json::from_slice(&data)
        .map_err(|e| Error::PaymentError(format!("Failed to parse payment store: {}", e)))
}

impl PaymentStatusSource for OfflinePixProcessor {
    fn payment_status(&self, reference: &str) -> Result<PaymentStatus> {
        let lookup = |statuses: &HashMap<String, PaymentStatus>| {
            statuses.get(reference).copied().ok_or_else(|| {
                Error::PaymentError(format!("Unknown payment reference {}", reference))
            })
        };
        match &self.store {
            Some(path) => lookup(&read_statuses(path)?),
            None => lookup(&self.statuses),
        }
    }
}

impl PaymentProcessor for OfflinePixProcessor {
    fn create_payment(&mut self, request: &PaymentRequest) -> Result<PaymentInit> {
        if request.amount.is_zero() {
            return Err(Error::PaymentError(
                "Payment amount must be greater than zero".to_string(),
            ));
        }
        self.refresh()?;
        let reference = Self::reference_for(&request.booking_id, request.amount);
        self.statuses
            .entry(reference.clone())
            .or_insert(PaymentStatus::Pending);
        self.write_through()?;
        Ok(PaymentInit::Pending {
            payment_url: format!("{}/{}", self.base_url, reference),
            reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: u64) -> PaymentRequest {
        PaymentRequest {
            booking_id: "b-1".to_string(),
            customer_id: "ana".to_string(),
            amount: Money::from_cents(amount),
            description: "Sala 1".to_string(),
        }
    }

    #[test]
    fn test_create_payment_pending() {
        let mut pix = OfflinePixProcessor::new("http://localhost:8080/pix/");
        let init = pix.create_payment(&request(4_500)).unwrap();
        let PaymentInit::Pending { reference, payment_url } = init else {
            panic!("expected pending payment");
        };
        assert!(reference.starts_with("pix_"));
        assert_eq!(payment_url, format!("http://localhost:8080/pix/{}", reference));
        assert_eq!(pix.payment_status(&reference).unwrap(), PaymentStatus::Pending);
    }

    #[test]
    fn test_reference_is_deterministic() {
        let a = OfflinePixProcessor::reference_for("b-1", Money::from_cents(100));
        let b = OfflinePixProcessor::reference_for("b-1", Money::from_cents(100));
        let c = OfflinePixProcessor::reference_for("b-1", Money::from_cents(101));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut pix = OfflinePixProcessor::new("http://localhost");
        assert!(pix.create_payment(&request(0)).is_err());
    }

    #[test]
    fn test_set_status() {
        let mut pix = OfflinePixProcessor::new("http://localhost");
        let reference = OfflinePixProcessor::reference_for("b-1", Money::from_cents(500));
        assert!(pix.set_status(&reference, PaymentStatus::Paid).is_err());

        pix.create_payment(&request(500)).unwrap();
        pix.set_status(&reference, PaymentStatus::Paid).unwrap();
        assert_eq!(pix.payment_status(&reference).unwrap(), PaymentStatus::Paid);
    }

    #[test]
    fn test_store_shares_statuses_across_instances() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("payments.json");

        let mut issuer = OfflinePixProcessor::with_store("http://localhost", path.clone()).unwrap();
        let PaymentInit::Pending { reference, .. } = issuer.create_payment(&request(700)).unwrap()
        else {
            panic!("expected pending payment");
        };

        // A second process marks the payment; the first sees it on its next read
        let mut webhook = OfflinePixProcessor::with_store("http://localhost", path.clone()).unwrap();
        assert_eq!(webhook.payment_status(&reference).unwrap(), PaymentStatus::Pending);
        webhook.set_status(&reference, PaymentStatus::Paid).unwrap();
        assert_eq!(issuer.payment_status(&reference).unwrap(), PaymentStatus::Paid);

        let reopened = OfflinePixProcessor::with_store("http://localhost", path).unwrap();
        assert_eq!(reopened.payment_status(&reference).unwrap(), PaymentStatus::Paid);
    }

    #[test]
    fn test_store_missing_file_starts_empty() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let pix =
            OfflinePixProcessor::with_store("http://localhost", temp_dir.path().join("p.json"))
                .unwrap();
        assert!(pix.payment_status("pix_unknown").is_err());
    }
}
