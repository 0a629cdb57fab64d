//! Coin changer controller.
//!
//! Wraps a [`CoinChanger`] driver: gates coin acceptance, runs payouts and
//! turns raw driver signals into [`ChangerEvent`]s. A payout requested while
//! the changer is disconnected is owed and paid once it is ready again, as is
//! the remainder of a payout cut short by a fault or a disconnect.

use crate::builder::TransitionTable;
use crate::core::{Machine, StateHistory, Transition};
use crate::device::{ChangerSignal, CoinChanger};
use crate::state_enum;
use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::mem;
use tracing::{info, warn};

state_enum! {
    pub enum ChangerState {
        Offline,
        Online,
        Ready,
        WaitCoin,
        Dispensing,
        Error,
    }
    error: [Error]
}

/// Events published by [`ChangerFsm`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangerEvent {
    Online,
    Offline,
    Initialized,
    Error { code: i32, text: String },
    CoinIn(Amount),
    /// Cumulative amount paid out by the payout that just ended.
    AmountDispensed(Amount),
    TotalAmountChanged(Amount),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Trigger {
    Online,
    Initialized,
    StartAccept,
    StopAccept,
    CoinIn,
    StartDispense,
    CoinOut,
    StopDispense,
    Error,
    Offline,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    Online,
    Initialized,
    StartAccept,
    StopAccept,
    CoinIn,
    DispenseNothing,
    BeginDispense,
    ExtendDispense,
    Owe,
    CountCoin,
    FinishDispense,
    Fault,
    FaultWhileDispensing,
    Offline,
    OfflineWhileDispensing,
}

struct Check {
    amount: Amount,
    need: Amount,
    dispensed: Amount,
    resume: ChangerState,
}

fn nothing(c: &Check) -> bool {
    c.amount == 0
}

fn payout_complete(c: &Check) -> bool {
    c.dispensed + c.amount >= c.need
}

fn resumes_ready(c: &Check) -> bool {
    c.resume == ChangerState::Ready
}

fn table() -> TransitionTable<ChangerState, Trigger, Check, Action> {
    use ChangerState::*;

    TransitionTable::new()
        .with(Transition::new(Trigger::Online, Offline, Online, Action::Online))
        .with(Transition::new(Trigger::Initialized, Online, Ready, Action::Initialized))
        .with(Transition::new(Trigger::StartAccept, Ready, WaitCoin, Action::StartAccept))
        .with(Transition::new(Trigger::StopAccept, WaitCoin, Ready, Action::StopAccept))
        .with(Transition::new(Trigger::CoinIn, WaitCoin, Ready, Action::CoinIn))
        .with_each_stay(Trigger::CoinIn, &[Online, Ready, Dispensing, Error], Action::CoinIn)
        // payouts
        .with(Transition::stay(Trigger::StartDispense, Ready, Action::DispenseNothing).when(nothing))
        .with(Transition::stay(Trigger::StartDispense, WaitCoin, Action::DispenseNothing).when(nothing))
        .with(Transition::stay(Trigger::StartDispense, Error, Action::DispenseNothing).when(nothing))
        .with_each(Trigger::StartDispense, &[Ready, WaitCoin, Error], Dispensing, Action::BeginDispense)
        .with(Transition::stay(Trigger::StartDispense, Dispensing, Action::ExtendDispense).unless(nothing))
        .with_each_stay(Trigger::StartDispense, &[Offline, Online], Action::Owe)
        .with(Transition::stay(Trigger::CoinOut, Dispensing, Action::CountCoin).unless(payout_complete))
        .with(Transition::new(Trigger::CoinOut, Dispensing, Ready, Action::FinishDispense).when(resumes_ready))
        .with(Transition::new(Trigger::CoinOut, Dispensing, Error, Action::FinishDispense))
        .with(Transition::new(Trigger::StopDispense, Dispensing, Ready, Action::FinishDispense).when(resumes_ready))
        .with(Transition::new(Trigger::StopDispense, Dispensing, Error, Action::FinishDispense))
        // faults
        .with_each(Trigger::Error, &[Online, Ready, WaitCoin], Error, Action::Fault)
        .with(Transition::new(Trigger::Error, Dispensing, Error, Action::FaultWhileDispensing))
        .with_each(Trigger::Offline, &[Online, Ready, WaitCoin, Error], Offline, Action::Offline)
        .with(Transition::new(Trigger::Offline, Dispensing, Offline, Action::OfflineWhileDispensing))
}

/// Controller for the coin changer.
pub struct ChangerFsm {
    device: Box<dyn CoinChanger>,
    machine: Machine<ChangerState, Trigger, Check, Action>,
    need: Amount,
    dispensed: Amount,
    owed: Amount,
    resume: ChangerState,
}

impl ChangerFsm {
    pub fn new(device: Box<dyn CoinChanger>, history_capacity: usize) -> Self {
        Self {
            device,
            machine: Machine::new("changer", ChangerState::Offline, table(), history_capacity),
            need: 0,
            dispensed: 0,
            owed: 0,
            resume: ChangerState::Ready,
        }
    }

    pub fn state(&self) -> ChangerState {
        self.machine.current()
    }

    pub fn history(&self) -> &StateHistory<ChangerState> {
        self.machine.history()
    }

    /// Payout carried over a disconnection or fault, not yet requested from the device.
    pub fn owed_amount(&self) -> Amount {
        self.owed
    }

    /// Paid out so far by the running payout.
    pub fn dispensed_amount(&self) -> Amount {
        self.dispensed
    }

    pub fn can_dispense_amount(&self, amount: Amount) -> bool {
        self.device.can_dispense_amount(amount)
    }

    pub fn total_amount(&self) -> Amount {
        self.device.total_amount()
    }

    pub fn start(&mut self) {
        self.device.start_device();
    }

    pub fn stop(&mut self) {
        self.device.stop_device();
    }

    pub fn start_accept(&mut self) -> Vec<ChangerEvent> {
        self.fire(Trigger::StartAccept, 0)
    }

    pub fn stop_accept(&mut self) -> Vec<ChangerEvent> {
        self.fire(Trigger::StopAccept, 0)
    }

    /// Pay out `amount`. Completion is reported as
    /// [`ChangerEvent::AmountDispensed`]; requests made during a running
    /// payout extend it.
    pub fn start_dispense(&mut self, amount: Amount) -> Vec<ChangerEvent> {
        self.fire(Trigger::StartDispense, amount)
    }

    /// End the running payout early, reporting what was paid so far.
    pub fn stop_dispense(&mut self) -> Vec<ChangerEvent> {
        self.fire(Trigger::StopDispense, 0)
    }

    /// Feed a raw driver signal.
    pub fn handle(&mut self, signal: ChangerSignal) -> Vec<ChangerEvent> {
        match signal {
            ChangerSignal::Online => self.fire(Trigger::Online, 0),
            ChangerSignal::Offline => self.fire(Trigger::Offline, 0),
            ChangerSignal::Initialized => self.fire(Trigger::Initialized, 0),
            ChangerSignal::Error { code, text } => self.fire_error(code, text),
            ChangerSignal::CoinIn(amount) => {
                let mut events = self.fire(Trigger::CoinIn, amount);
                events.push(ChangerEvent::TotalAmountChanged(self.device.total_amount()));
                events
            }
            ChangerSignal::CoinOut(amount) => {
                let mut events = self.fire(Trigger::CoinOut, amount);
                events.push(ChangerEvent::TotalAmountChanged(self.device.total_amount()));
                events
            }
        }
    }

    fn check(&self, amount: Amount) -> Check {
        Check {
            amount,
            need: self.need,
            dispensed: self.dispensed,
            resume: self.resume,
        }
    }

    fn fire(&mut self, trigger: Trigger, amount: Amount) -> Vec<ChangerEvent> {
        let from = self.machine.current();
        let check = self.check(amount);
        match self.machine.fire(trigger, &check) {
            Some(action) => self.apply(action, from, amount),
            None => Vec::new(),
        }
    }

    fn fire_error(&mut self, code: i32, text: String) -> Vec<ChangerEvent> {
        let check = self.check(0);
        let Some(action) = self.machine.fire(Trigger::Error, &check) else {
            return Vec::new();
        };
        warn!(code, text = %text, "changer fault");
        self.device.stop_accept();
        let mut events = vec![ChangerEvent::Error { code, text }];
        if action == Action::FaultWhileDispensing {
            events.push(self.abandon_payout());
        }
        events
    }

    fn apply(&mut self, action: Action, from: ChangerState, amount: Amount) -> Vec<ChangerEvent> {
        let mut events = Vec::new();
        match action {
            Action::Online => events.push(ChangerEvent::Online),
            Action::Offline => events.push(ChangerEvent::Offline),
            Action::Initialized => {
                events.push(ChangerEvent::Initialized);
                let owed = mem::take(&mut self.owed);
                if owed > 0 {
                    info!(owed, "paying out owed change");
                    events.extend(self.start_dispense(owed));
                }
            }
            Action::StartAccept => self.device.start_accept(),
            Action::StopAccept => self.device.stop_accept(),
            Action::CoinIn => {
                self.device.stop_accept();
                events.push(ChangerEvent::CoinIn(amount));
            }
            Action::DispenseNothing => events.push(ChangerEvent::AmountDispensed(0)),
            Action::BeginDispense => {
                if from == ChangerState::WaitCoin {
                    self.device.stop_accept();
                }
                self.resume = if from == ChangerState::Error {
                    ChangerState::Error
                } else {
                    ChangerState::Ready
                };
                self.need = amount;
                self.dispensed = 0;
                self.device.dispense_amount(amount);
            }
            Action::ExtendDispense => {
                self.need += amount;
                self.device.dispense_amount(amount);
            }
            Action::Owe => {
                if amount > 0 {
                    warn!(amount, "changer unavailable, payout owed");
                }
                self.owed += amount;
                events.push(ChangerEvent::AmountDispensed(0));
            }
            Action::CountCoin => self.dispensed += amount,
            Action::FinishDispense => {
                self.dispensed += amount;
                events.push(self.finish_payout());
            }
            Action::OfflineWhileDispensing => {
                events.push(self.abandon_payout());
                events.push(ChangerEvent::Offline);
            }
            // Faults carry a payload and are applied in `fire_error`.
            Action::Fault | Action::FaultWhileDispensing => {}
        }
        events
    }

    /// Report what an interrupted payout managed; the rest is owed.
    fn abandon_payout(&mut self) -> ChangerEvent {
        let shortfall = self.need.saturating_sub(self.dispensed);
        if shortfall > 0 {
            warn!(shortfall, "payout interrupted, remainder owed");
        }
        self.owed += shortfall;
        self.finish_payout()
    }

    fn finish_payout(&mut self) -> ChangerEvent {
        self.need = 0;
        let dispensed = mem::take(&mut self.dispensed);
        if dispensed > 0 {
            info!(dispensed, "payout finished");
        }
        ChangerEvent::AmountDispensed(dispensed)
    }
}
