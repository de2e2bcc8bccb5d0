use arthemi_checkout::checkout::{Checkout, CheckoutRequest, OfflinePixProcessor, PaymentStatus};
use arthemi_checkout::config::Config;
use arthemi_checkout::current_timestamp;
use arthemi_checkout::error::{Error, Result};
use arthemi_checkout::logger::Logger;
use arthemi_checkout::money::Money;
use arthemi_checkout::pricing::{settle, SettlementRequest};
use arthemi_checkout::state::{
    Booking, BookingKind, BookingRecords, CreditLedger, LedgerState, LoggingHook,
};
use arthemi_checkout::storage::{AuditEntry, FileStorage, Storage};
use clap::{Parser, Subcommand};
use std::fs;

#[derive(Parser)]
#[command(name = "arthemi-checkout")]
#[command(about = "Arthemi checkout CLI - credits, coupons and booking settlement")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: "human" or "json"
    #[arg(short, long)]
    pub format: Option<String>,

    /// Data directory path
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the data directory
    Init,

    /// Compute a settlement without touching any customer data
    Quote {
        /// Gross amount in centavos
        #[arg(long)]
        gross: u64,

        /// Available credits in centavos
        #[arg(long, default_value_t = 0)]
        credits: u64,

        #[arg(long)]
        coupon: Option<String>,
    },

    /// List the coupon catalog
    Coupons,

    /// Check whether a coupon code is currently valid
    ValidateCoupon { code: String },

    /// Add credits to a customer's balance for a room
    GrantCredits {
        #[arg(long)]
        customer: String,

        #[arg(long)]
        room: String,

        /// Amount in centavos
        #[arg(long)]
        amount: u64,
    },

    /// Show a customer's credit lots
    Credits { customer: String },

    /// Submit a booking or credit purchase
    Checkout {
        #[arg(long)]
        customer: String,

        #[arg(long)]
        booking: String,

        #[arg(long)]
        room: String,

        /// Gross amount in centavos
        #[arg(long)]
        gross: u64,

        #[arg(long)]
        coupon: Option<String>,

        /// Buy credits instead of booking the room
        #[arg(long)]
        credit_purchase: bool,
    },

    /// Confirm payment for a pending booking
    Confirm { booking: String },

    /// Cancel a pending booking
    Cancel {
        booking: String,

        /// Record as expired instead of cancelled
        #[arg(long)]
        expired: bool,
    },

    /// Refund a paid booking
    Refund { booking: String },

    /// Record a processor status for a booking's payment (gateway webhook)
    MarkPayment {
        booking: String,

        /// One of: pending, paid, failed, expired
        #[arg(long)]
        status: String,
    },

    /// Read the payment status once and apply it to the booking
    Sync { booking: String },

    /// Poll the payment until it settles or the configured timeout passes
    Await { booking: String },

    /// List a customer's bookings
    Bookings { customer: String },

    /// Show the audit journal
    History {
        /// First journal position to show
        #[arg(long, default_value_t = 0)]
        from: u64,
    },
}

/// Format output based on format type
fn format_output<T: serde::Serialize + std::fmt::Debug>(data: &T, format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(data)
            .map_err(|e| Error::StateError(format!("Failed to serialize JSON: {}", e))),
        _ => Ok(format!("{:#?}", data)),
    }
}

/// Journal the changed bookings and snapshot the ledger.
fn commit(
    storage: &mut FileStorage,
    state: &LedgerState,
    journal_len: u64,
    changed: &[&Booking],
    now: u64,
) -> Result<()> {
    for booking in changed {
        storage.append_audit(&AuditEntry::new((*booking).clone(), now)?)?;
    }
    storage.persist_state(state, journal_len + changed.len() as u64)
}

fn parse_payment_status(status: &str) -> Result<PaymentStatus> {
    match status.trim().to_lowercase().as_str() {
        "pending" => Ok(PaymentStatus::Pending),
        "paid" => Ok(PaymentStatus::Paid),
        "failed" => Ok(PaymentStatus::Failed),
        "expired" => Ok(PaymentStatus::Expired),
        other => Err(Error::InvalidRequest(format!(
            "Unknown payment status '{}', expected pending, paid, failed or expired",
            other
        ))),
    }
}

fn find_booking(state: &LedgerState, booking_id: &str) -> Result<Booking> {
    state
        .booking(booking_id)
        .cloned()
        .ok_or_else(|| Error::BookingNotFound(booking_id.to_string()))
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.set_data_dir(std::path::PathBuf::from(dir));
    }
    if let Some(format) = cli.format {
        config.set_output_format(format);
    }
    Logger::set_level(config.log_level());

    let format = config.get_output_format().to_string();
    let catalog = config.load_catalog()?;
    let mut storage = FileStorage::new(&config);
    let now = current_timestamp();
    let mut checkout = Checkout::new(
        &catalog,
        config.minimum_charge,
        OfflinePixProcessor::with_store(&config.payment_base_url, config.get_payments_path())?,
    )
    .with_hook(LoggingHook);

    match cli.command {
        Commands::Init => {
            fs::create_dir_all(config.get_data_dir())
                .map_err(|e| Error::StateError(format!("Failed to create data directory: {}", e)))?;
            println!("Initialized data directory at: {}", config.get_data_dir().display());
            Ok(())
        }

        Commands::Quote {
            gross,
            credits,
            coupon,
        } => {
            let result = settle(
                &catalog,
                &SettlementRequest::new(
                    Money::from_cents(gross),
                    Money::from_cents(credits),
                    coupon.as_deref(),
                ),
            );
            println!("{}", format_output(&result, &format)?);
            Ok(())
        }

        Commands::Coupons => {
            let coupons: Vec<_> = catalog.iter().collect();
            println!("{}", format_output(&coupons, &format)?);
            Ok(())
        }

        Commands::ValidateCoupon { code } => {
            let valid = catalog.is_valid_coupon(&code);
            let output = CouponCheckOutput {
                code: arthemi_checkout::pricing::normalize_code(&code),
                valid,
                percent_bps: catalog.get(&code).map(|c| c.percent_bps),
            };
            println!("{}", format_output(&output, &format)?);
            Ok(())
        }

        Commands::GrantCredits {
            customer,
            room,
            amount,
        } => {
            let (mut state, journal_len) = storage.load_or_default()?;
            let lot_id = state
                .grant_credits(&customer, &room, Money::from_cents(amount), now)
                .ok_or_else(|| Error::InvalidRequest("Amount must be greater than zero".to_string()))?;
            commit(&mut storage, &state, journal_len, &[], now)?;
            println!(
                "✓ Granted {} to {} for {} (lot {})",
                Money::from_cents(amount),
                customer,
                room,
                lot_id
            );
            Ok(())
        }

        Commands::Credits { customer } => {
            let (state, _) = storage.load_or_default()?;
            let lots = state
                .customer(&customer)
                .map(|c| c.lots.clone())
                .unwrap_or_default();
            let output = CreditsOutput { customer, lots };
            println!("{}", format_output(&output, &format)?);
            Ok(())
        }

        Commands::Checkout {
            customer,
            booking,
            room,
            gross,
            coupon,
            credit_purchase,
        } => {
            let (mut state, journal_len) = storage.load_or_default()?;
            let request = CheckoutRequest {
                booking_id: booking,
                customer_id: customer,
                context: room,
                kind: if credit_purchase {
                    BookingKind::CreditPurchase
                } else {
                    BookingKind::RoomBooking
                },
                gross_amount: Money::from_cents(gross),
                coupon_code: coupon,
            };

            let outcome = checkout.submit(&mut state, &request, now)?;
            commit(&mut storage, &state, journal_len, &[outcome.booking()], now)?;
            println!("{}", format_output(&outcome, &format)?);
            Ok(())
        }

        Commands::Confirm { booking } => {
            let (mut state, journal_len) = storage.load_or_default()?;
            let updated = checkout.confirm(&mut state, &booking, now)?;
            commit(&mut storage, &state, journal_len, &[&updated], now)?;
            println!("{}", format_output(&updated, &format)?);
            Ok(())
        }

        Commands::Cancel { booking, expired } => {
            let (mut state, journal_len) = storage.load_or_default()?;
            let updated = checkout.cancel(&mut state, &booking, expired, now)?;
            commit(&mut storage, &state, journal_len, &[&updated], now)?;
            println!("{}", format_output(&updated, &format)?);
            Ok(())
        }

        Commands::Refund { booking } => {
            let (mut state, journal_len) = storage.load_or_default()?;
            let updated = checkout.refund(&mut state, &booking, now)?;
            commit(&mut storage, &state, journal_len, &[&updated], now)?;
            println!("{}", format_output(&updated, &format)?);
            Ok(())
        }

        Commands::MarkPayment { booking, status } => {
            let status = parse_payment_status(&status)?;
            let (state, _) = storage.load_or_default()?;
            let record = find_booking(&state, &booking)?;
            let reference = record.payment_reference.ok_or_else(|| {
                Error::InvalidRequest(format!("Booking {} has no payment to mark", booking))
            })?;
            checkout.processor_mut().set_status(&reference, status)?;
            println!("✓ Payment {} for {} marked {:?}", reference, booking, status);
            Ok(())
        }

        Commands::Sync { booking } => {
            let (mut state, journal_len) = storage.load_or_default()?;
            let before = find_booking(&state, &booking)?.status;
            let updated = checkout.sync_payment(&mut state, &booking, now)?;
            if updated.status != before {
                commit(&mut storage, &state, journal_len, &[&updated], now)?;
            }
            println!("{}", format_output(&updated, &format)?);
            Ok(())
        }

        Commands::Await { booking } => {
            let (mut state, journal_len) = storage.load_or_default()?;
            let before = find_booking(&state, &booking)?.status;
            let updated = checkout.await_payment(
                &mut state,
                &booking,
                &config.poll_policy,
                std::thread::sleep,
                now,
            )?;
            if updated.status != before {
                commit(&mut storage, &state, journal_len, &[&updated], current_timestamp())?;
            }
            println!("{}", format_output(&updated, &format)?);
            Ok(())
        }

        Commands::Bookings { customer } => {
            let (state, _) = storage.load_or_default()?;
            let bookings: Vec<Booking> = state.bookings_for(&customer).into_iter().cloned().collect();
            let output = BookingsOutput { customer, bookings };
            println!("{}", format_output(&output, &format)?);
            Ok(())
        }

        Commands::History { from } => {
            let entries = storage.load_audit_from(from)?;
            let history: Vec<HistoryOutput> = entries
                .iter()
                .enumerate()
                .map(|(i, e)| HistoryOutput {
                    position: from + i as u64,
                    recorded_at: e.recorded_at,
                    booking_id: e.booking.id.clone(),
                    status: format!("{:?}", e.booking.status),
                    gross_amount: e.booking.gross_amount,
                    discount_amount: e.booking.discount_amount,
                    net_amount: e.booking.net_amount,
                    coupon_code: e.booking.coupon_code.clone(),
                    digest_ok: e.verify(),
                })
                .collect();
            if history.iter().any(|h| !h.digest_ok) {
                Logger::warn("audit journal contains entries whose digest does not match");
            }
            println!("{}", format_output(&history, &format)?);
            Ok(())
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct CouponCheckOutput {
    code: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    percent_bps: Option<u16>,
}

#[derive(Debug, serde::Serialize)]
struct CreditsOutput {
    customer: String,
    lots: Vec<arthemi_checkout::state::CreditLot>,
}

#[derive(Debug, serde::Serialize)]
struct BookingsOutput {
    customer: String,
    bookings: Vec<Booking>,
}

#[derive(Debug, serde::Serialize)]
struct HistoryOutput {
    position: u64,
    recorded_at: u64,
    booking_id: String,
    status: String,
    gross_amount: Money,
    discount_amount: Money,
    net_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_code: Option<String>,
    digest_ok: bool,
}
