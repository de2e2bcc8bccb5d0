//! Demo: credits + coupon checkout with a PIX payment.
//!
//! Run: cargo run --example checkout_demo

use arthemi_checkout::checkout::{
    Checkout, CheckoutOutcome, CheckoutRequest, OfflinePixProcessor, PaymentStatus,
    PIX_MINIMUM_CHARGE,
};
use arthemi_checkout::money::Money;
use arthemi_checkout::pricing::CouponCatalog;
use arthemi_checkout::state::{BookingKind, CouponUsage, CreditLedger, LedgerState, LoggingHook};

fn main() -> arthemi_checkout::error::Result<()> {
    let catalog = CouponCatalog::standard();
    let mut checkout = Checkout::new(
        &catalog,
        PIX_MINIMUM_CHARGE,
        OfflinePixProcessor::new("http://localhost:8080/pix"),
    )
    .with_hook(LoggingHook);
    let mut ledger = LedgerState::new();

    println!("=== Checkout Demo ===\n");

    println!("1. Ana has R$ 50,00 of credits for sala-1");
    ledger.grant_credits("ana", "sala-1", Money::from_cents(5_000), 1);

    println!("2. Ana books sala-1 for R$ 100,00 with coupon PRIMEIRACOMPRA");
    let request = CheckoutRequest {
        booking_id: "b-1".to_string(),
        customer_id: "ana".to_string(),
        context: "sala-1".to_string(),
        kind: BookingKind::RoomBooking,
        gross_amount: Money::from_cents(10_000),
        coupon_code: Some("PRIMEIRACOMPRA".to_string()),
    };
    let outcome = checkout.submit(&mut ledger, &request, 10)?;
    let booking = outcome.booking().clone();
    println!("   credits used: {}", booking.credits_used);
    println!("   discount:     {}", booking.discount_amount);
    println!("   net amount:   {}", booking.net_amount);
    println!("   to pay:       {}", booking.amount_to_pay);
    if let CheckoutOutcome::AwaitingPayment { payment_url, .. } = &outcome {
        println!("   pay at:       {}\n", payment_url);
    }

    println!("3. PIX payment arrives");
    if let Some(reference) = booking.payment_reference.as_deref() {
        checkout
            .processor_mut()
            .set_status(reference, PaymentStatus::Paid)?;
    }
    let paid = checkout.sync_payment(&mut ledger, "b-1", 20)?;
    println!("   status: {:?}", paid.status);
    println!(
        "   credits left: {}",
        ledger.available_credits("ana", "sala-1")
    );
    println!(
        "   PRIMEIRACOMPRA redeemed: {}\n",
        ledger.has_used("ana", "PRIMEIRACOMPRA")
    );

    println!("4. A second booking fully covered by new credits ignores the coupon");
    ledger.grant_credits("ana", "sala-1", Money::from_cents(20_000), 30);
    let second = CheckoutRequest {
        booking_id: "b-2".to_string(),
        coupon_code: Some("PRIMEIRACOMPRA".to_string()),
        ..request
    };
    let outcome = checkout.submit(&mut ledger, &second, 40)?;
    println!("   status: {:?}", outcome.booking().status);
    println!("   to pay: {}", outcome.booking().amount_to_pay);

    println!("\n=== Demo complete ===");
    Ok(())
}
