//! Boundary to the payment hardware drivers and the preparation unit.
//!
//! Drivers implement the command traits; the signals they raise are fed back
//! into the owning controller (see [`crate::fsm::Kiosk::on_changer`] and
//! [`crate::fsm::Kiosk::on_validator`]).

use crate::types::{Amount, ProductId};
use serde::{Deserialize, Serialize};

/// Commands understood by a coin changer driver.
pub trait CoinChanger: Send {
    fn start_device(&mut self);
    fn stop_device(&mut self);
    fn start_accept(&mut self);
    fn stop_accept(&mut self);
    /// Begin paying out `amount`; progress arrives as [`ChangerSignal::CoinOut`].
    fn dispense_amount(&mut self, amount: Amount);
    /// Whether the tubes can currently pay out exactly `amount`.
    fn can_dispense_amount(&self, amount: Amount) -> bool;
    /// Value currently held in the tubes.
    fn total_amount(&self) -> Amount;
}

/// Commands understood by a bill validator driver.
pub trait BillValidator: Send {
    fn start_device(&mut self);
    fn stop_device(&mut self);
    fn start_accept(&mut self);
    fn stop_accept(&mut self);
    /// Capture the bill held in escrow.
    fn stack_bill(&mut self);
    /// Hand the bill held in escrow back to the customer.
    fn return_bill(&mut self);
    /// Value in the cashbox.
    fn total_amount(&self) -> Amount;
    fn bill_count(&self) -> u32;
    /// Overwrite the cashbox counter, e.g. after it was emptied.
    fn set_total_amount(&mut self, amount: Amount);
}

/// Signals raised by a coin changer driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangerSignal {
    Online,
    Offline,
    Initialized,
    Error { code: i32, text: String },
    CoinIn(Amount),
    CoinOut(Amount),
}

/// Signals raised by a bill validator driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorSignal {
    Online,
    Offline,
    Initialized,
    Error { code: i32, text: String },
    /// A bill is held in escrow waiting for a permit or ban.
    CheckBill(Amount),
    /// A bill was captured.
    BillIn(Amount),
}

/// Product preparation unit.
///
/// `prepare` only starts the work; the result is reported later as a
/// [`PrepareOutcome`].
pub trait Preparer: Send {
    fn prepare(&mut self, product: &ProductId);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrepareOutcome {
    Prepared,
    NotPrepared,
}
