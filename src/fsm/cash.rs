//! Cash transaction controller.
//!
//! Composes the coin changer and the bill validator into one operation:
//! collect at least `need` money units, then pay back the change or the
//! whole deposit. Events raised by the devices in reaction to the
//! controller's own commands are queued and handled once the current
//! transition is complete.

use crate::builder::TransitionTable;
use crate::core::{Machine, StateHistory, Transition};
use crate::device::{ChangerSignal, ValidatorSignal};
use crate::fsm::changer::{ChangerEvent, ChangerFsm, ChangerState};
use crate::fsm::validator::{ValidatorEvent, ValidatorFsm, ValidatorState};
use crate::state_enum;
use crate::timer::{TimerHandle, TimerService};
use crate::types::{Amount, DeviceKind, Fault};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::mem;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

state_enum! {
    pub enum CashState {
        Init,
        WaitReady,
        Ready,
        AcceptAmount,
        WaitDispense,
        StartDispense,
        Error,
    }
    error: [Error]
}

/// Money counters republished for displays and telemetry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Telemetry {
    DepositAmountChanged(Amount),
    DispenseAmountChanged(Amount),
    CoinAmountChanged(Amount),
    BillAmountChanged(Amount),
    TotalAmountChanged(Amount),
    BillCountChanged(u32),
    CoinIn(Amount),
    BillIn(Amount),
}

/// Events published by [`CashFsm`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashEvent {
    Ready,
    /// Enough money was collected; carries the deposit.
    Accepted(Amount),
    /// The accept window closed before enough money arrived. Any partial
    /// deposit is being returned.
    NotAccepted,
    /// A payout ended; carries the amount actually paid.
    Dispensed(Amount),
    Error(Fault),
    Telemetry(Telemetry),
}

/// Readiness of one payment device as last reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Offline,
    Ready,
    Faulted,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Trigger {
    Start,
    DeviceReady,
    Accept,
    CoinIn,
    BillIn,
    CheckBill,
    Timeout,
    DispenseAll,
    DispenseChange,
    AmountDispensed,
    Fault,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    Start,
    StartReady,
    AnnounceReady,
    AcceptNothing,
    BeginAccept,
    AddCoin,
    KickBack,
    AddBill,
    Complete,
    PermitBill,
    RefuseBill,
    BanBill,
    TopUp,
    ReturnStray,
    Timeout,
    DispenseAll,
    DispenseChange,
    FinishDispense,
    ReportDispensed,
    ReportAndRearm,
    RecordOffline,
    PublishFault,
    FaultInReady,
    FaultInAccept,
    Latch,
}

struct Check {
    amount: Amount,
    enough: bool,
    coin_changeable: bool,
    bill_changeable: bool,
    devices_ready: bool,
    offline: bool,
}

fn nothing(c: &Check) -> bool {
    c.amount == 0
}

fn enough(c: &Check) -> bool {
    c.enough
}

fn coin_changeable(c: &Check) -> bool {
    c.coin_changeable
}

fn bill_changeable(c: &Check) -> bool {
    c.bill_changeable
}

fn devices_ready(c: &Check) -> bool {
    c.devices_ready
}

fn offline(c: &Check) -> bool {
    c.offline
}

fn table() -> TransitionTable<CashState, Trigger, Check, Action> {
    use CashState::*;

    const OUTSIDE_PAYMENT: [CashState; 5] = [Init, WaitReady, Ready, StartDispense, Error];

    TransitionTable::new()
        .with(Transition::new(Trigger::Start, Init, Ready, Action::StartReady).when(devices_ready))
        .with(Transition::new(Trigger::Start, Init, WaitReady, Action::Start))
        .with(Transition::new(Trigger::DeviceReady, WaitReady, Ready, Action::AnnounceReady).when(devices_ready))
        .with(Transition::new(Trigger::DeviceReady, Error, Ready, Action::AnnounceReady).when(devices_ready))
        // collecting
        .with(Transition::new(Trigger::Accept, Ready, WaitDispense, Action::AcceptNothing).when(nothing))
        .with(Transition::new(Trigger::Accept, Ready, AcceptAmount, Action::BeginAccept))
        .with(Transition::stay(Trigger::CoinIn, AcceptAmount, Action::AddCoin).unless(enough))
        .with(Transition::stay(Trigger::CoinIn, AcceptAmount, Action::KickBack).unless(coin_changeable))
        .with(Transition::new(Trigger::CoinIn, AcceptAmount, WaitDispense, Action::Complete))
        .with(Transition::stay(Trigger::BillIn, AcceptAmount, Action::AddBill).unless(enough))
        .with(Transition::new(Trigger::BillIn, AcceptAmount, WaitDispense, Action::Complete))
        .with(Transition::stay(Trigger::CheckBill, AcceptAmount, Action::PermitBill).when(bill_changeable))
        .with(Transition::stay(Trigger::CheckBill, AcceptAmount, Action::RefuseBill))
        .with_each_stay(
            Trigger::CheckBill,
            &[Init, WaitReady, Ready, WaitDispense, StartDispense, Error],
            Action::BanBill,
        )
        .with(Transition::stay(Trigger::CoinIn, WaitDispense, Action::TopUp))
        .with(Transition::stay(Trigger::BillIn, WaitDispense, Action::TopUp))
        .with_each_stay(Trigger::CoinIn, &OUTSIDE_PAYMENT, Action::ReturnStray)
        .with_each_stay(Trigger::BillIn, &OUTSIDE_PAYMENT, Action::ReturnStray)
        .with(Transition::new(Trigger::Timeout, AcceptAmount, Ready, Action::Timeout))
        // paying out
        .with(Transition::new(Trigger::DispenseAll, WaitDispense, StartDispense, Action::DispenseAll))
        .with(Transition::new(Trigger::DispenseChange, WaitDispense, StartDispense, Action::DispenseChange))
        .with(Transition::new(Trigger::AmountDispensed, StartDispense, Ready, Action::FinishDispense).when(devices_ready))
        .with(Transition::new(Trigger::AmountDispensed, StartDispense, Error, Action::FinishDispense))
        .with(Transition::stay(Trigger::AmountDispensed, AcceptAmount, Action::ReportAndRearm))
        .with_each_stay(
            Trigger::AmountDispensed,
            &[Init, WaitReady, Ready, WaitDispense, Error],
            Action::ReportDispensed,
        )
        // faults
        .with(Transition::stay(Trigger::Fault, WaitReady, Action::RecordOffline).when(offline))
        .with(Transition::new(Trigger::Fault, WaitReady, Error, Action::PublishFault))
        .with(Transition::new(Trigger::Fault, Ready, Error, Action::FaultInReady))
        .with(Transition::new(Trigger::Fault, AcceptAmount, WaitDispense, Action::FaultInAccept))
        .with(Transition::stay(Trigger::Fault, WaitDispense, Action::Latch))
        .with(Transition::stay(Trigger::Fault, StartDispense, Action::Latch))
        .with(Transition::stay(Trigger::Fault, Error, Action::PublishFault))
}

enum DeviceEvent {
    Changer(ChangerEvent),
    Validator(ValidatorEvent),
}

/// Controller for one money-collection transaction at a time.
pub struct CashFsm {
    changer: ChangerFsm,
    validator: ValidatorFsm,
    timers: Box<dyn TimerService>,
    machine: Machine<CashState, Trigger, Check, Action>,
    changer_status: DeviceStatus,
    validator_status: DeviceStatus,
    accept_timeout: Option<Duration>,
    timer: Option<TimerHandle>,
    need: Amount,
    accepted: Amount,
    latched: Option<Fault>,
    inbox: VecDeque<DeviceEvent>,
}

impl CashFsm {
    /// `accept_timeout` of `None` keeps the accept window open until enough
    /// money arrives.
    pub fn new(
        changer: ChangerFsm,
        validator: ValidatorFsm,
        timers: Box<dyn TimerService>,
        accept_timeout: Option<Duration>,
        history_capacity: usize,
    ) -> Self {
        Self {
            changer,
            validator,
            timers,
            machine: Machine::new("cash", CashState::Init, table(), history_capacity),
            changer_status: DeviceStatus::Offline,
            validator_status: DeviceStatus::Offline,
            accept_timeout,
            timer: None,
            need: 0,
            accepted: 0,
            latched: None,
            inbox: VecDeque::new(),
        }
    }

    pub fn state(&self) -> CashState {
        self.machine.current()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == CashState::Ready
    }

    pub fn history(&self) -> &StateHistory<CashState> {
        self.machine.history()
    }

    pub fn changer_state(&self) -> ChangerState {
        self.changer.state()
    }

    pub fn validator_state(&self) -> ValidatorState {
        self.validator.state()
    }

    pub fn changer_status(&self) -> DeviceStatus {
        self.changer_status
    }

    pub fn validator_status(&self) -> DeviceStatus {
        self.validator_status
    }

    /// Fault held back until the running payout completes.
    pub fn latched_fault(&self) -> Option<&Fault> {
        self.latched.as_ref()
    }

    /// Live accept timer, if any.
    pub fn accept_timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    pub fn need_amount(&self) -> Amount {
        self.need
    }

    /// Money collected in the current transaction.
    pub fn deposit_amount(&self) -> Amount {
        self.accepted
    }

    /// Change owed for the current transaction.
    pub fn dispense_amount(&self) -> Amount {
        self.accepted.saturating_sub(self.need)
    }

    /// Payout the changer still has to make once it reconnects.
    pub fn owed_amount(&self) -> Amount {
        self.changer.owed_amount()
    }

    pub fn coin_amount(&self) -> Amount {
        self.changer.total_amount()
    }

    pub fn bill_amount(&self) -> Amount {
        self.validator.total_amount()
    }

    pub fn total_amount(&self) -> Amount {
        self.coin_amount() + self.bill_amount()
    }

    pub fn set_bill_amount(&mut self, amount: Amount) {
        self.validator.set_total_amount(amount);
    }

    pub fn start(&mut self) -> Vec<CashEvent> {
        let mut out = Vec::new();
        self.fire(Trigger::Start, 0, &mut out);
        self.settle(out)
    }

    pub fn stop(&mut self) {
        self.cancel_timer();
        self.changer.stop();
        self.validator.stop();
    }

    /// Open the accept window for `need` money units.
    pub fn accept(&mut self, need: Amount) -> Vec<CashEvent> {
        let mut out = Vec::new();
        self.fire(Trigger::Accept, need, &mut out);
        self.settle(out)
    }

    /// Return the whole deposit.
    pub fn dispense_all(&mut self) -> Vec<CashEvent> {
        let mut out = Vec::new();
        self.fire(Trigger::DispenseAll, 0, &mut out);
        self.settle(out)
    }

    /// Return the deposit in excess of the need.
    pub fn dispense_change(&mut self) -> Vec<CashEvent> {
        let mut out = Vec::new();
        self.fire(Trigger::DispenseChange, 0, &mut out);
        self.settle(out)
    }

    pub fn on_changer(&mut self, signal: ChangerSignal) -> Vec<CashEvent> {
        let events = self.changer.handle(signal);
        self.queue_changer(events);
        self.settle(Vec::new())
    }

    pub fn on_validator(&mut self, signal: ValidatorSignal) -> Vec<CashEvent> {
        let events = self.validator.handle(signal);
        self.queue_validator(events);
        self.settle(Vec::new())
    }

    /// Expiry of a timer scheduled by this controller.
    pub fn on_timer(&mut self, handle: TimerHandle) -> Vec<CashEvent> {
        if self.timer != Some(handle) {
            trace!(?handle, "stale accept timer ignored");
            return Vec::new();
        }
        self.timer = None;
        let mut out = Vec::new();
        self.fire(Trigger::Timeout, 0, &mut out);
        self.settle(out)
    }

    fn queue_changer(&mut self, events: Vec<ChangerEvent>) {
        self.inbox.extend(events.into_iter().map(DeviceEvent::Changer));
    }

    fn queue_validator(&mut self, events: Vec<ValidatorEvent>) {
        self.inbox.extend(events.into_iter().map(DeviceEvent::Validator));
    }

    fn settle(&mut self, mut out: Vec<CashEvent>) -> Vec<CashEvent> {
        while let Some(event) = self.inbox.pop_front() {
            match event {
                DeviceEvent::Changer(event) => self.on_changer_event(event, &mut out),
                DeviceEvent::Validator(event) => self.on_validator_event(event, &mut out),
            }
        }
        out
    }

    fn on_changer_event(&mut self, event: ChangerEvent, out: &mut Vec<CashEvent>) {
        match event {
            ChangerEvent::Online => {}
            ChangerEvent::Initialized => {
                self.changer_status = DeviceStatus::Ready;
                self.fire(Trigger::DeviceReady, 0, out);
            }
            ChangerEvent::Offline => {
                self.changer_status = DeviceStatus::Offline;
                self.fire_fault(Fault::offline(DeviceKind::Changer), out);
            }
            ChangerEvent::Error { code, text } => {
                self.changer_status = DeviceStatus::Faulted;
                self.fire_fault(Fault::device(DeviceKind::Changer, code, text), out);
            }
            ChangerEvent::CoinIn(amount) => {
                out.push(CashEvent::Telemetry(Telemetry::CoinIn(amount)));
                self.fire(Trigger::CoinIn, amount, out);
            }
            ChangerEvent::AmountDispensed(amount) => self.fire(Trigger::AmountDispensed, amount, out),
            ChangerEvent::TotalAmountChanged(coins) => {
                out.push(CashEvent::Telemetry(Telemetry::CoinAmountChanged(coins)));
                out.push(CashEvent::Telemetry(Telemetry::TotalAmountChanged(
                    coins + self.validator.total_amount(),
                )));
            }
        }
    }

    fn on_validator_event(&mut self, event: ValidatorEvent, out: &mut Vec<CashEvent>) {
        match event {
            ValidatorEvent::Online => {}
            ValidatorEvent::Initialized => {
                self.validator_status = DeviceStatus::Ready;
                self.fire(Trigger::DeviceReady, 0, out);
            }
            ValidatorEvent::Offline => {
                self.validator_status = DeviceStatus::Offline;
                self.fire_fault(Fault::offline(DeviceKind::Validator), out);
            }
            ValidatorEvent::Error { code, text } => {
                self.validator_status = DeviceStatus::Faulted;
                self.fire_fault(Fault::device(DeviceKind::Validator, code, text), out);
            }
            ValidatorEvent::CheckBill(amount) => self.fire(Trigger::CheckBill, amount, out),
            ValidatorEvent::BillIn(amount) => {
                out.push(CashEvent::Telemetry(Telemetry::BillIn(amount)));
                self.fire(Trigger::BillIn, amount, out);
            }
            ValidatorEvent::TotalAmountChanged(bills) => {
                out.push(CashEvent::Telemetry(Telemetry::BillAmountChanged(bills)));
                out.push(CashEvent::Telemetry(Telemetry::TotalAmountChanged(
                    bills + self.changer.total_amount(),
                )));
            }
            ValidatorEvent::BillCountChanged(count) => {
                out.push(CashEvent::Telemetry(Telemetry::BillCountChanged(count)));
            }
        }
    }

    fn devices_ready(&self) -> bool {
        self.changer_status == DeviceStatus::Ready && self.validator_status == DeviceStatus::Ready
    }

    fn check(&self, trigger: Trigger, amount: Amount, fault: Option<&Fault>) -> Check {
        let total = self.accepted + amount;
        let change = total.saturating_sub(self.need);
        let change_possible = change == 0 || self.changer.can_dispense_amount(change);
        Check {
            amount,
            enough: total >= self.need,
            coin_changeable: trigger == Trigger::CoinIn && change_possible,
            bill_changeable: trigger == Trigger::CheckBill
                && self.changer.can_dispense_amount(total)
                && change_possible,
            devices_ready: self.devices_ready(),
            offline: fault.is_some_and(Fault::is_offline),
        }
    }

    fn fire(&mut self, trigger: Trigger, amount: Amount, out: &mut Vec<CashEvent>) {
        let check = self.check(trigger, amount, None);
        if let Some(action) = self.machine.fire(trigger, &check) {
            self.apply(action, amount, out);
        }
    }

    fn fire_fault(&mut self, fault: Fault, out: &mut Vec<CashEvent>) {
        let check = self.check(Trigger::Fault, 0, Some(&fault));
        let Some(action) = self.machine.fire(Trigger::Fault, &check) else {
            debug!(%fault, "fault before start ignored");
            return;
        };
        match action {
            Action::RecordOffline => debug!(%fault, "device not connected yet"),
            Action::PublishFault => {
                warn!(%fault, "cash fault");
                out.push(CashEvent::Error(fault));
            }
            Action::FaultInReady => {
                warn!(%fault, "cash fault while idle");
                self.stop_accept();
                let deposit = mem::take(&mut self.accepted);
                self.need = 0;
                if deposit > 0 {
                    let events = self.changer.start_dispense(deposit);
                    self.queue_changer(events);
                }
                out.push(CashEvent::Error(fault));
            }
            Action::FaultInAccept => {
                warn!(%fault, deposit = self.accepted, "cash fault while collecting");
                self.cancel_timer();
                self.stop_accept();
                out.push(CashEvent::Error(fault));
            }
            Action::Latch => {
                info!(%fault, "fault held until payout completes");
                self.latched.get_or_insert(fault);
            }
            _ => {}
        }
    }

    fn apply(&mut self, action: Action, amount: Amount, out: &mut Vec<CashEvent>) {
        match action {
            Action::Start => self.start_devices(),
            Action::StartReady => {
                self.start_devices();
                out.push(CashEvent::Ready);
            }
            Action::AnnounceReady => {
                info!("cash ready");
                out.push(CashEvent::Ready);
            }
            Action::AcceptNothing => {
                self.need = 0;
                self.accepted = 0;
                out.push(CashEvent::Accepted(0));
            }
            Action::BeginAccept => {
                info!(need = amount, "accepting payment");
                self.need = amount;
                self.accepted = 0;
                self.arm_timer();
                self.start_accept();
            }
            Action::AddCoin => {
                self.add(amount, out);
                self.restart_timer();
                let events = self.changer.start_accept();
                self.queue_changer(events);
            }
            Action::KickBack => {
                info!(amount, "coin cannot be changed, returning it");
                self.restart_timer();
                let events = self.changer.start_dispense(amount);
                self.queue_changer(events);
            }
            Action::AddBill => {
                self.add(amount, out);
                self.restart_timer();
                let events = self.validator.start_accept();
                self.queue_validator(events);
            }
            Action::Complete => {
                self.cancel_timer();
                self.add(amount, out);
                self.stop_accept();
                info!(deposit = self.accepted, need = self.need, "payment accepted");
                out.push(CashEvent::Accepted(self.accepted));
            }
            Action::PermitBill => {
                let events = self.validator.permit_bill();
                self.queue_validator(events);
            }
            Action::RefuseBill => {
                info!(amount, "bill refused, change not available");
                let mut events = self.validator.ban_bill();
                events.extend(self.validator.start_accept());
                self.queue_validator(events);
            }
            Action::BanBill => {
                let events = self.validator.ban_bill();
                self.queue_validator(events);
            }
            Action::TopUp => {
                self.add(amount, out);
                out.push(CashEvent::Accepted(self.accepted));
            }
            Action::ReturnStray => {
                warn!(amount, "money outside a transaction, returning it");
                let events = self.changer.start_dispense(amount);
                self.queue_changer(events);
            }
            Action::Timeout => {
                self.stop_accept();
                let refund = mem::take(&mut self.accepted);
                self.need = 0;
                info!(refund, "accept window expired");
                if refund > 0 {
                    let events = self.changer.start_dispense(refund);
                    self.queue_changer(events);
                }
                self.publish_counters(out);
                out.push(CashEvent::NotAccepted);
            }
            Action::DispenseAll => {
                let amount = mem::take(&mut self.accepted);
                self.need = 0;
                self.dispense(amount, out);
            }
            Action::DispenseChange => {
                let amount = self.dispense_amount();
                self.accepted = 0;
                self.need = 0;
                self.dispense(amount, out);
            }
            Action::FinishDispense => self.finish_dispense(amount, out),
            Action::ReportDispensed => out.push(CashEvent::Dispensed(amount)),
            Action::ReportAndRearm => {
                out.push(CashEvent::Dispensed(amount));
                let events = self.changer.start_accept();
                self.queue_changer(events);
            }
            // Fault actions are applied in `fire_fault`.
            Action::RecordOffline
            | Action::PublishFault
            | Action::FaultInReady
            | Action::FaultInAccept
            | Action::Latch => {}
        }
    }

    fn start_devices(&mut self) {
        self.changer.start();
        self.validator.start();
    }

    fn start_accept(&mut self) {
        let changer = self.changer.start_accept();
        self.queue_changer(changer);
        let validator = self.validator.start_accept();
        self.queue_validator(validator);
    }

    fn stop_accept(&mut self) {
        let changer = self.changer.stop_accept();
        self.queue_changer(changer);
        let validator = self.validator.stop_accept();
        self.queue_validator(validator);
    }

    fn add(&mut self, amount: Amount, out: &mut Vec<CashEvent>) {
        self.accepted += amount;
        self.publish_counters(out);
    }

    fn publish_counters(&self, out: &mut Vec<CashEvent>) {
        out.push(CashEvent::Telemetry(Telemetry::DepositAmountChanged(self.accepted)));
        out.push(CashEvent::Telemetry(Telemetry::DispenseAmountChanged(
            self.dispense_amount(),
        )));
    }

    fn dispense(&mut self, amount: Amount, out: &mut Vec<CashEvent>) {
        info!(amount, "dispensing");
        self.publish_counters(out);
        let events = self.changer.start_dispense(amount);
        self.queue_changer(events);
    }

    fn finish_dispense(&mut self, amount: Amount, out: &mut Vec<CashEvent>) {
        if let Some(fault) = self.latched.take() {
            out.push(CashEvent::Error(fault));
        }
        out.push(CashEvent::Dispensed(amount));
    }

    fn arm_timer(&mut self) {
        self.cancel_timer();
        if let Some(delay) = self.accept_timeout {
            self.timer = Some(self.timers.schedule(delay));
        }
    }

    fn restart_timer(&mut self) {
        if self.timer.is_some() {
            self.arm_timer();
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            self.timers.cancel(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Call, CallLog, ChangePolicy, SimChanger, SimValidator};
    use crate::timer::ManualTimers;

    const TIMEOUT: Duration = Duration::from_secs(60);

    struct Rig {
        cash: CashFsm,
        log: CallLog,
        changer: SimChanger,
        clock: ManualTimers,
    }

    fn rig() -> Rig {
        let log = CallLog::new();
        let changer = SimChanger::new(log.clone());
        let clock = ManualTimers::new();
        let cash = CashFsm::new(
            ChangerFsm::new(Box::new(changer.clone()), 32),
            ValidatorFsm::new(Box::new(SimValidator::new(log.clone())), 32),
            Box::new(clock.clone()),
            Some(TIMEOUT),
            32,
        );
        Rig {
            cash,
            log,
            changer,
            clock,
        }
    }

    fn ready_rig() -> Rig {
        let mut rig = rig();
        assert!(rig.cash.start().is_empty());
        assert_eq!(rig.cash.state(), CashState::WaitReady);
        rig.cash.on_changer(ChangerSignal::Online);
        assert!(rig.cash.on_changer(ChangerSignal::Initialized).is_empty());
        rig.cash.on_validator(ValidatorSignal::Online);
        assert_eq!(
            rig.cash.on_validator(ValidatorSignal::Initialized),
            vec![CashEvent::Ready]
        );
        rig.log.take();
        rig
    }

    fn accepting(need: Amount) -> Rig {
        let mut rig = ready_rig();
        assert!(rig.cash.accept(need).is_empty());
        assert_eq!(rig.cash.state(), CashState::AcceptAmount);
        rig.log.take();
        rig
    }

    fn without_telemetry(events: Vec<CashEvent>) -> Vec<CashEvent> {
        events
            .into_iter()
            .filter(|e| !matches!(e, CashEvent::Telemetry(_)))
            .collect()
    }

    #[test]
    fn transition_table_is_well_formed() {
        assert!(table().validate().is_ok());
    }

    #[test]
    fn start_waits_for_both_devices() {
        let mut rig = rig();
        rig.cash.start();
        assert_eq!(rig.log.calls(), vec![Call::ChangerStart, Call::ValidatorStart]);

        rig.cash.on_changer(ChangerSignal::Online);
        rig.cash.on_changer(ChangerSignal::Initialized);
        assert_eq!(rig.cash.state(), CashState::WaitReady);
        assert_eq!(rig.cash.changer_status(), DeviceStatus::Ready);
        assert_eq!(rig.cash.validator_status(), DeviceStatus::Offline);
    }

    #[test]
    fn accept_arms_timer_and_both_devices() {
        let mut rig = ready_rig();
        rig.cash.accept(30);

        assert_eq!(rig.cash.need_amount(), 30);
        assert_eq!(rig.clock.pending().len(), 1);
        assert_eq!(rig.cash.changer_state(), ChangerState::WaitCoin);
        assert_eq!(rig.cash.validator_state(), ValidatorState::WaitBill);
        assert_eq!(
            rig.log.calls(),
            vec![Call::ChangerStartAccept, Call::ValidatorStartAccept]
        );
    }

    #[test]
    fn accept_nothing_completes_at_once() {
        let mut rig = ready_rig();
        assert_eq!(rig.cash.accept(0), vec![CashEvent::Accepted(0)]);
        assert_eq!(rig.cash.state(), CashState::WaitDispense);
        assert!(rig.clock.pending().is_empty());
    }

    #[test]
    fn coins_short_of_need_keep_collecting() {
        let mut rig = accepting(30);
        let first = rig.cash.accept_timer();

        let events = rig.cash.on_changer(ChangerSignal::CoinIn(10));

        assert_eq!(rig.cash.state(), CashState::AcceptAmount);
        assert_eq!(rig.cash.deposit_amount(), 10);
        assert!(events.contains(&CashEvent::Telemetry(Telemetry::CoinIn(10))));
        assert!(events.contains(&CashEvent::Telemetry(Telemetry::DepositAmountChanged(10))));
        // timer restarted, coin acceptance re-enabled
        assert_ne!(rig.cash.accept_timer(), first);
        assert_eq!(rig.clock.pending().len(), 1);
        assert_eq!(rig.cash.changer_state(), ChangerState::WaitCoin);
    }

    #[test]
    fn exact_payment_is_accepted() {
        let mut rig = accepting(30);
        rig.cash.on_changer(ChangerSignal::CoinIn(10));
        let events = rig.cash.on_changer(ChangerSignal::CoinIn(20));

        assert_eq!(without_telemetry(events), vec![CashEvent::Accepted(30)]);
        assert_eq!(rig.cash.state(), CashState::WaitDispense);
        assert_eq!(rig.cash.dispense_amount(), 0);
        assert!(rig.clock.pending().is_empty());
        assert_eq!(rig.cash.validator_state(), ValidatorState::Ready);
    }

    #[test]
    fn unchangeable_coin_is_kicked_back() {
        let mut rig = accepting(30);
        rig.changer.set_policy(ChangePolicy::Never);

        let events = rig.cash.on_changer(ChangerSignal::CoinIn(50));

        assert!(without_telemetry(events).is_empty());
        assert_eq!(rig.cash.state(), CashState::AcceptAmount);
        assert_eq!(rig.cash.deposit_amount(), 0);
        assert_eq!(rig.log.dispensed(), vec![50]);

        rig.log.take();
        let events = rig.cash.on_changer(ChangerSignal::CoinOut(50));
        assert_eq!(without_telemetry(events), vec![CashEvent::Dispensed(50)]);
        assert_eq!(rig.log.calls(), vec![Call::ChangerStartAccept]);
        assert_eq!(rig.cash.changer_state(), ChangerState::WaitCoin);
    }

    #[test]
    fn bill_is_permitted_when_change_is_possible() {
        let mut rig = accepting(30);
        rig.cash.on_validator(ValidatorSignal::CheckBill(50));
        assert_eq!(rig.log.calls(), vec![Call::StackBill]);

        let events = rig.cash.on_validator(ValidatorSignal::BillIn(50));
        assert_eq!(without_telemetry(events), vec![CashEvent::Accepted(50)]);
        assert_eq!(rig.cash.dispense_amount(), 20);
    }

    #[test]
    fn bill_is_refused_when_change_is_impossible() {
        let mut rig = accepting(30);
        rig.changer.set_policy(ChangePolicy::Never);

        let events = rig.cash.on_validator(ValidatorSignal::CheckBill(50));

        assert!(events.is_empty());
        assert_eq!(rig.log.calls(), vec![Call::ReturnBill, Call::ValidatorStartAccept]);
        assert_eq!(rig.cash.validator_state(), ValidatorState::WaitBill);
        assert_eq!(rig.cash.state(), CashState::AcceptAmount);
    }

    #[test]
    fn bill_outside_transaction_is_banned() {
        let mut rig = ready_rig();
        rig.cash.on_validator(ValidatorSignal::CheckBill(50));
        assert_eq!(rig.log.calls(), vec![Call::ReturnBill]);
    }

    #[test]
    fn timeout_refunds_partial_payment() {
        let mut rig = accepting(30);
        rig.cash.on_changer(ChangerSignal::CoinIn(10));
        rig.log.take();

        let fired = rig.clock.advance(TIMEOUT);
        assert_eq!(fired.len(), 1);
        let events = rig.cash.on_timer(fired[0]);

        assert_eq!(without_telemetry(events), vec![CashEvent::NotAccepted]);
        assert_eq!(rig.cash.state(), CashState::Ready);
        assert_eq!(rig.cash.deposit_amount(), 0);
        assert_eq!(rig.log.dispensed(), vec![10]);

        let events = rig.cash.on_changer(ChangerSignal::CoinOut(10));
        assert_eq!(without_telemetry(events), vec![CashEvent::Dispensed(10)]);
    }

    #[test]
    fn stale_timer_is_ignored() {
        let mut rig = accepting(30);
        let stale = rig.cash.accept_timer().unwrap();
        rig.cash.on_changer(ChangerSignal::CoinIn(10));

        assert!(rig.cash.on_timer(stale).is_empty());
        assert_eq!(rig.cash.state(), CashState::AcceptAmount);
    }

    #[test]
    fn disabled_timeout_never_arms() {
        let log = CallLog::new();
        let clock = ManualTimers::new();
        let mut cash = CashFsm::new(
            ChangerFsm::new(Box::new(SimChanger::new(log.clone())), 8),
            ValidatorFsm::new(Box::new(SimValidator::new(log.clone())), 8),
            Box::new(clock.clone()),
            None,
            8,
        );
        cash.start();
        cash.on_changer(ChangerSignal::Online);
        cash.on_changer(ChangerSignal::Initialized);
        cash.on_validator(ValidatorSignal::Online);
        cash.on_validator(ValidatorSignal::Initialized);
        cash.accept(30);
        cash.on_changer(ChangerSignal::CoinIn(10));

        assert!(cash.accept_timer().is_none());
        assert!(clock.pending().is_empty());
    }

    #[test]
    fn change_is_dispensed_once() {
        let mut rig = accepting(30);
        rig.cash.on_changer(ChangerSignal::CoinIn(50));
        rig.log.take();

        rig.cash.dispense_change();
        rig.cash.dispense_change();

        assert_eq!(rig.log.dispensed(), vec![20]);
        assert_eq!(rig.cash.state(), CashState::StartDispense);
        assert_eq!(rig.cash.deposit_amount(), 0);

        let events = rig.cash.on_changer(ChangerSignal::CoinOut(20));
        assert_eq!(without_telemetry(events), vec![CashEvent::Dispensed(20)]);
        assert_eq!(rig.cash.state(), CashState::Ready);
    }

    #[test]
    fn no_change_still_completes() {
        let mut rig = accepting(30);
        rig.cash.on_changer(ChangerSignal::CoinIn(30));

        let events = rig.cash.dispense_change();

        assert_eq!(without_telemetry(events), vec![CashEvent::Dispensed(0)]);
        assert_eq!(rig.cash.state(), CashState::Ready);
    }

    #[test]
    fn money_after_acceptance_is_added() {
        let mut rig = accepting(30);
        rig.cash.on_changer(ChangerSignal::CoinIn(30));

        let events = rig.cash.on_validator(ValidatorSignal::BillIn(10));

        assert_eq!(without_telemetry(events), vec![CashEvent::Accepted(40)]);
        assert_eq!(rig.cash.dispense_amount(), 10);
    }

    #[test]
    fn stray_coin_is_returned() {
        let mut rig = ready_rig();
        rig.cash.on_changer(ChangerSignal::CoinIn(5));
        assert_eq!(rig.log.dispensed(), vec![5]);
        assert_eq!(rig.cash.state(), CashState::Ready);
    }

    #[test]
    fn fault_while_collecting_holds_deposit_for_refund() {
        let mut rig = accepting(30);
        rig.cash.on_changer(ChangerSignal::CoinIn(10));

        let events = rig.cash.on_validator(ValidatorSignal::Error {
            code: 4,
            text: "jam".into(),
        });

        assert_eq!(
            without_telemetry(events),
            vec![CashEvent::Error(Fault::device(DeviceKind::Validator, 4, "jam"))]
        );
        assert_eq!(rig.cash.state(), CashState::WaitDispense);
        assert_eq!(rig.cash.deposit_amount(), 10);
        assert!(rig.clock.pending().is_empty());

        rig.log.take();
        rig.cash.dispense_all();
        assert_eq!(rig.log.dispensed(), vec![10]);

        let events = rig.cash.on_changer(ChangerSignal::CoinOut(10));
        assert_eq!(without_telemetry(events), vec![CashEvent::Dispensed(10)]);
        assert_eq!(rig.cash.state(), CashState::Error);
    }

    #[test]
    fn fault_during_payout_is_surfaced_after_it() {
        let mut rig = accepting(30);
        rig.cash.on_changer(ChangerSignal::CoinIn(50));
        rig.cash.dispense_change();

        let events = rig.cash.on_validator(ValidatorSignal::Offline);
        assert!(events.is_empty());
        assert!(rig.cash.latched_fault().is_some());

        let events = rig.cash.on_changer(ChangerSignal::CoinOut(20));
        assert_eq!(
            without_telemetry(events),
            vec![
                CashEvent::Error(Fault::offline(DeviceKind::Validator)),
                CashEvent::Dispensed(20),
            ]
        );
        assert_eq!(rig.cash.state(), CashState::Error);
        assert!(rig.cash.latched_fault().is_none());
    }

    #[test]
    fn changer_lost_during_payout_reports_progress_then_fault() {
        let mut rig = accepting(30);
        rig.cash.on_changer(ChangerSignal::CoinIn(50));
        rig.cash.dispense_change();
        rig.cash.on_changer(ChangerSignal::CoinOut(5));

        let events = rig.cash.on_changer(ChangerSignal::Offline);

        assert_eq!(
            without_telemetry(events),
            vec![
                CashEvent::Dispensed(5),
                CashEvent::Error(Fault::offline(DeviceKind::Changer)),
            ]
        );
        assert_eq!(rig.cash.state(), CashState::Error);
        assert_eq!(rig.cash.changer_status(), DeviceStatus::Offline);
        assert!(rig.cash.latched_fault().is_none());
    }

    #[test]
    fn recovery_requires_both_devices() {
        let mut rig = ready_rig();
        let events = rig.cash.on_changer(ChangerSignal::Error {
            code: 2,
            text: "coin jam".into(),
        });
        assert_eq!(
            events,
            vec![CashEvent::Error(Fault::device(DeviceKind::Changer, 2, "coin jam"))]
        );
        assert_eq!(rig.cash.state(), CashState::Error);

        rig.cash.on_changer(ChangerSignal::Offline);
        rig.cash.on_changer(ChangerSignal::Online);
        let events = rig.cash.on_changer(ChangerSignal::Initialized);

        assert_eq!(events, vec![CashEvent::Ready]);
        assert_eq!(rig.cash.state(), CashState::Ready);
    }

    #[test]
    fn offline_while_waiting_for_devices_is_only_recorded() {
        let mut rig = rig();
        rig.cash.start();
        rig.cash.on_changer(ChangerSignal::Online);
        rig.cash.on_changer(ChangerSignal::Initialized);

        assert!(rig.cash.on_changer(ChangerSignal::Offline).is_empty());
        assert_eq!(rig.cash.state(), CashState::WaitReady);
        assert_eq!(rig.cash.changer_status(), DeviceStatus::Offline);
    }
}
