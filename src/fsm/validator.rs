//! Bill validator controller.
//!
//! Adds the escrow decision point on top of the driver: a bill presented
//! while waiting for payment is held in [`ValidatorState::BillConfirm`] until
//! the owner permits or bans it. Bills presented at any other time go back
//! to the customer.

use crate::builder::TransitionTable;
use crate::core::{Machine, StateHistory, Transition};
use crate::device::{BillValidator, ValidatorSignal};
use crate::state_enum;
use crate::types::Amount;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

state_enum! {
    pub enum ValidatorState {
        Offline,
        Online,
        Ready,
        WaitBill,
        BillConfirm,
        Error,
    }
    error: [Error]
}

/// Events published by [`ValidatorFsm`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorEvent {
    Online,
    Offline,
    Initialized,
    Error { code: i32, text: String },
    /// A bill is in escrow and needs a permit or ban.
    CheckBill(Amount),
    BillIn(Amount),
    TotalAmountChanged(Amount),
    BillCountChanged(u32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Trigger {
    Online,
    Initialized,
    StartAccept,
    StopAccept,
    CheckBill,
    BanBill,
    PermitBill,
    Error,
    Offline,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    Online,
    Initialized,
    StartAccept,
    Nothing,
    ReturnBill,
    HoldBill,
    StackBill,
    Fault,
    Offline,
}

fn table() -> TransitionTable<ValidatorState, Trigger, (), Action> {
    use ValidatorState::*;

    TransitionTable::new()
        .with(Transition::new(Trigger::Online, Offline, Online, Action::Online))
        .with(Transition::new(Trigger::Initialized, Online, Ready, Action::Initialized))
        .with(Transition::new(Trigger::StartAccept, Ready, WaitBill, Action::StartAccept))
        .with(Transition::new(Trigger::StopAccept, WaitBill, Ready, Action::Nothing))
        .with(Transition::new(Trigger::StopAccept, BillConfirm, Ready, Action::ReturnBill))
        .with(Transition::new(Trigger::CheckBill, WaitBill, BillConfirm, Action::HoldBill))
        .with_each_stay(Trigger::CheckBill, &[Ready, Error], Action::ReturnBill)
        .with(Transition::new(Trigger::BanBill, BillConfirm, Ready, Action::ReturnBill))
        .with(Transition::new(Trigger::PermitBill, BillConfirm, Ready, Action::StackBill))
        .with_each(Trigger::Error, &[Online, Ready, WaitBill, BillConfirm], Error, Action::Fault)
        .with_each(
            Trigger::Offline,
            &[Online, Ready, WaitBill, BillConfirm, Error],
            Offline,
            Action::Offline,
        )
}

/// Controller for the bill validator.
pub struct ValidatorFsm {
    device: Box<dyn BillValidator>,
    machine: Machine<ValidatorState, Trigger, (), Action>,
    escrow: Option<Amount>,
}

impl ValidatorFsm {
    pub fn new(device: Box<dyn BillValidator>, history_capacity: usize) -> Self {
        Self {
            device,
            machine: Machine::new("validator", ValidatorState::Offline, table(), history_capacity),
            escrow: None,
        }
    }

    pub fn state(&self) -> ValidatorState {
        self.machine.current()
    }

    pub fn history(&self) -> &StateHistory<ValidatorState> {
        self.machine.history()
    }

    /// Value of the bill held in escrow, if any.
    pub fn escrow(&self) -> Option<Amount> {
        self.escrow
    }

    pub fn total_amount(&self) -> Amount {
        self.device.total_amount()
    }

    pub fn bill_count(&self) -> u32 {
        self.device.bill_count()
    }

    pub fn set_total_amount(&mut self, amount: Amount) {
        self.device.set_total_amount(amount);
    }

    pub fn start(&mut self) {
        self.device.start_device();
    }

    pub fn stop(&mut self) {
        self.device.stop_device();
    }

    pub fn start_accept(&mut self) -> Vec<ValidatorEvent> {
        self.fire(Trigger::StartAccept, 0)
    }

    /// Leave the payment window. A bill waiting in escrow is returned.
    pub fn stop_accept(&mut self) -> Vec<ValidatorEvent> {
        self.fire(Trigger::StopAccept, 0)
    }

    pub fn permit_bill(&mut self) -> Vec<ValidatorEvent> {
        self.fire(Trigger::PermitBill, 0)
    }

    pub fn ban_bill(&mut self) -> Vec<ValidatorEvent> {
        self.fire(Trigger::BanBill, 0)
    }

    pub fn handle(&mut self, signal: ValidatorSignal) -> Vec<ValidatorEvent> {
        match signal {
            ValidatorSignal::Online => self.fire(Trigger::Online, 0),
            ValidatorSignal::Offline => self.fire(Trigger::Offline, 0),
            ValidatorSignal::Initialized => self.fire(Trigger::Initialized, 0),
            ValidatorSignal::CheckBill(amount) => self.fire(Trigger::CheckBill, amount),
            ValidatorSignal::Error { code, text } => {
                if self.machine.fire(Trigger::Error, &()).is_none() {
                    return Vec::new();
                }
                warn!(code, text = %text, "validator fault");
                self.escrow = None;
                self.device.stop_accept();
                self.device.return_bill();
                vec![ValidatorEvent::Error { code, text }]
            }
            // Captured money is reported whatever the state.
            ValidatorSignal::BillIn(amount) => vec![
                ValidatorEvent::BillIn(amount),
                ValidatorEvent::TotalAmountChanged(self.device.total_amount()),
                ValidatorEvent::BillCountChanged(self.device.bill_count()),
            ],
        }
    }

    fn fire(&mut self, trigger: Trigger, amount: Amount) -> Vec<ValidatorEvent> {
        let Some(action) = self.machine.fire(trigger, &()) else {
            if trigger == Trigger::CheckBill {
                debug!(amount, "bill presented while not accepting");
            }
            return Vec::new();
        };
        let mut events = Vec::new();
        match action {
            Action::Online => events.push(ValidatorEvent::Online),
            Action::Offline => {
                self.escrow = None;
                events.push(ValidatorEvent::Offline);
            }
            Action::Initialized => {
                self.device.start_accept();
                events.push(ValidatorEvent::Initialized);
            }
            Action::StartAccept => self.device.start_accept(),
            Action::Nothing | Action::Fault => {}
            Action::ReturnBill => {
                self.escrow = None;
                self.device.return_bill();
            }
            Action::HoldBill => {
                self.escrow = Some(amount);
                events.push(ValidatorEvent::CheckBill(amount));
            }
            Action::StackBill => {
                self.escrow = None;
                self.device.stack_bill();
            }
        }
        events
    }
}
