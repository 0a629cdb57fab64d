//! Simulated payment devices and preparation unit.
//!
//! The simulators record every command into a shared [`CallLog`] and never
//! raise signals on their own: the caller feeds [`ChangerSignal`]s and
//! [`ValidatorSignal`]s back into the kiosk, which keeps scenarios fully
//! deterministic.
//!
//! [`ChangerSignal`]: crate::device::ChangerSignal
//! [`ValidatorSignal`]: crate::device::ValidatorSignal

use crate::device::{BillValidator, CoinChanger, Preparer};
use crate::types::{Amount, ProductId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Command issued to a simulated collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    ChangerStart,
    ChangerStop,
    ChangerStartAccept,
    ChangerStopAccept,
    Dispense(Amount),
    ValidatorStart,
    ValidatorStop,
    ValidatorStartAccept,
    ValidatorStopAccept,
    StackBill,
    ReturnBill,
    SetBillTotal(Amount),
    Prepare(ProductId),
}

/// Ordered record of every command, shared by all simulators of one kiosk.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Return and forget the recorded calls.
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *lock(&self.calls))
    }

    pub fn count(&self, call: &Call) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    pub fn contains(&self, call: &Call) -> bool {
        self.count(call) > 0
    }

    /// Amounts of every payout request, in order.
    pub fn dispensed(&self) -> Vec<Amount> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                Call::Dispense(amount) => Some(*amount),
                _ => None,
            })
            .collect()
    }
}

/// Which payouts the simulated changer claims it can make.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangePolicy {
    Always,
    /// Only a zero payout.
    Never,
    /// Payouts up to and including the amount.
    UpTo(Amount),
}

impl ChangePolicy {
    pub fn allows(&self, amount: Amount) -> bool {
        match self {
            Self::Always => true,
            Self::Never => amount == 0,
            Self::UpTo(max) => amount <= *max,
        }
    }
}

#[derive(Debug)]
struct Tubes {
    policy: ChangePolicy,
    total: Amount,
}

/// Simulated coin changer. Clones share policy and tube contents.
#[derive(Clone, Debug)]
pub struct SimChanger {
    log: CallLog,
    tubes: Arc<Mutex<Tubes>>,
}

impl SimChanger {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            tubes: Arc::new(Mutex::new(Tubes {
                policy: ChangePolicy::Always,
                total: 0,
            })),
        }
    }

    pub fn set_policy(&self, policy: ChangePolicy) {
        lock(&self.tubes).policy = policy;
    }

    pub fn set_total(&self, total: Amount) {
        lock(&self.tubes).total = total;
    }
}

impl CoinChanger for SimChanger {
    fn start_device(&mut self) {
        self.log.push(Call::ChangerStart);
    }

    fn stop_device(&mut self) {
        self.log.push(Call::ChangerStop);
    }

    fn start_accept(&mut self) {
        self.log.push(Call::ChangerStartAccept);
    }

    fn stop_accept(&mut self) {
        self.log.push(Call::ChangerStopAccept);
    }

    fn dispense_amount(&mut self, amount: Amount) {
        self.log.push(Call::Dispense(amount));
    }

    fn can_dispense_amount(&self, amount: Amount) -> bool {
        lock(&self.tubes).policy.allows(amount)
    }

    fn total_amount(&self) -> Amount {
        lock(&self.tubes).total
    }
}

#[derive(Debug, Default)]
struct Cashbox {
    total: Amount,
    count: u32,
}

/// Simulated bill validator. Clones share the cashbox counters.
#[derive(Clone, Debug)]
pub struct SimValidator {
    log: CallLog,
    cashbox: Arc<Mutex<Cashbox>>,
}

impl SimValidator {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            cashbox: Arc::new(Mutex::new(Cashbox::default())),
        }
    }

    /// Count a captured bill, as the hardware would before reporting it.
    pub fn capture(&self, amount: Amount) {
        let mut cashbox = lock(&self.cashbox);
        cashbox.total += amount;
        cashbox.count += 1;
    }
}

impl BillValidator for SimValidator {
    fn start_device(&mut self) {
        self.log.push(Call::ValidatorStart);
    }

    fn stop_device(&mut self) {
        self.log.push(Call::ValidatorStop);
    }

    fn start_accept(&mut self) {
        self.log.push(Call::ValidatorStartAccept);
    }

    fn stop_accept(&mut self) {
        self.log.push(Call::ValidatorStopAccept);
    }

    fn stack_bill(&mut self) {
        self.log.push(Call::StackBill);
    }

    fn return_bill(&mut self) {
        self.log.push(Call::ReturnBill);
    }

    fn total_amount(&self) -> Amount {
        lock(&self.cashbox).total
    }

    fn bill_count(&self) -> u32 {
        lock(&self.cashbox).count
    }

    fn set_total_amount(&mut self, amount: Amount) {
        self.log.push(Call::SetBillTotal(amount));
        lock(&self.cashbox).total = amount;
    }
}

/// Simulated preparation unit.
#[derive(Clone, Debug)]
pub struct SimPreparer {
    log: CallLog,
}

impl SimPreparer {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl Preparer for SimPreparer {
    fn prepare(&mut self, product: &ProductId) {
        self.log.push(Call::Prepare(product.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_policy_limits_payouts() {
        assert!(ChangePolicy::Always.allows(1_000));
        assert!(ChangePolicy::Never.allows(0));
        assert!(!ChangePolicy::Never.allows(1));
        assert!(ChangePolicy::UpTo(50).allows(50));
        assert!(!ChangePolicy::UpTo(50).allows(51));
    }

    #[test]
    fn simulators_share_one_log() {
        let log = CallLog::new();
        let mut changer = SimChanger::new(log.clone());
        let mut validator = SimValidator::new(log.clone());

        changer.dispense_amount(5);
        validator.return_bill();
        changer.dispense_amount(7);

        assert_eq!(
            log.calls(),
            vec![Call::Dispense(5), Call::ReturnBill, Call::Dispense(7)]
        );
        assert_eq!(log.dispensed(), vec![5, 7]);
        assert_eq!(log.take().len(), 3);
        assert!(log.calls().is_empty());
    }

    #[test]
    fn captured_bills_update_the_cashbox() {
        let validator = SimValidator::new(CallLog::new());
        validator.capture(100);
        validator.capture(50);

        assert_eq!(validator.total_amount(), 150);
        assert_eq!(validator.bill_count(), 2);
    }
}
