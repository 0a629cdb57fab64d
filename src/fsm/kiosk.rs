//! Sale controller.
//!
//! Drives one sale at a time: select, pay, prepare, dispense. Owns the cash
//! controller and the preparation unit, and decides through the configured
//! [`FaultPolicy`] which faults take the kiosk out of service.

use crate::builder::TransitionTable;
use crate::config::{ConfigError, FaultPolicy, KioskConfig};
use crate::core::{Machine, StateHistory, Transition};
use crate::device::{
    BillValidator, ChangerSignal, CoinChanger, PrepareOutcome, Preparer, ValidatorSignal,
};
use crate::fsm::cash::{CashEvent, CashFsm, CashState, Telemetry};
use crate::fsm::changer::{ChangerFsm, ChangerState};
use crate::fsm::validator::{ValidatorFsm, ValidatorState};
use crate::snapshot::{KioskSnapshot, SNAPSHOT_VERSION};
use crate::state_enum;
use crate::timer::{TimerHandle, TimerService};
use crate::types::{Amount, Fault, ProductId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{info, warn};
use uuid::Uuid;

state_enum! {
    pub enum KioskState {
        Init,
        WaitReady,
        Ready,
        StartSell,
        StartPrepare,
        StartDispense,
        Error,
    }
    error: [Error]
}

/// Whether the kiosk may sell, independent of its mechanical state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    InService,
    /// Latched by the first fatal fault until [`Kiosk::reset_service`].
    OutOfService(Fault),
}

/// Events published by [`Kiosk`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KioskEvent {
    Ready,
    /// The sale was abandoned before payment; the display should reset.
    ResetSell,
    Error(Fault),
    Accepted(Amount),
    NotAccepted,
    Dispensed(Amount),
    Telemetry(Telemetry),
}

/// Hardware and services a kiosk drives.
pub struct Collaborators {
    pub changer: Box<dyn CoinChanger>,
    pub validator: Box<dyn BillValidator>,
    pub preparer: Box<dyn Preparer>,
    pub timers: Box<dyn TimerService>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Trigger {
    Start,
    CashReady,
    Sell,
    NotAccepted,
    Accepted,
    Prepared,
    NotPrepared,
    Dispensed,
    CashError,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    StartCash,
    AnnounceReady,
    BeginSale,
    RefuseSale,
    ResetSell,
    Prepare,
    DispenseChange,
    DispenseAll,
    AnnounceError,
    Record,
    AbortSale,
}

struct Check {
    known_product: bool,
    in_service: bool,
    cash_ready: bool,
}

fn can_sell(c: &Check) -> bool {
    c.known_product && c.in_service && c.cash_ready
}

fn cash_ready(c: &Check) -> bool {
    c.cash_ready
}

fn table() -> TransitionTable<KioskState, Trigger, Check, Action> {
    use KioskState::*;

    TransitionTable::new()
        .with(Transition::new(Trigger::Start, Init, WaitReady, Action::StartCash))
        .with_each(Trigger::CashReady, &[WaitReady, Error], Ready, Action::AnnounceReady)
        .with(Transition::new(Trigger::Sell, Ready, StartSell, Action::BeginSale).when(can_sell))
        .with(Transition::stay(Trigger::Sell, Ready, Action::RefuseSale))
        .with(Transition::new(Trigger::NotAccepted, StartSell, Ready, Action::ResetSell))
        .with(Transition::new(Trigger::Accepted, StartSell, StartPrepare, Action::Prepare))
        .with(Transition::new(Trigger::Prepared, StartPrepare, StartDispense, Action::DispenseChange))
        .with(Transition::new(Trigger::NotPrepared, StartPrepare, StartDispense, Action::DispenseAll))
        .with(Transition::new(Trigger::Dispensed, StartDispense, Ready, Action::AnnounceReady).when(cash_ready))
        .with(Transition::new(Trigger::Dispensed, StartDispense, Error, Action::AnnounceError))
        .with_each(Trigger::CashError, &[WaitReady, Ready, Error], Error, Action::Record)
        .with(Transition::new(Trigger::CashError, StartSell, StartDispense, Action::AbortSale))
        .with_each_stay(Trigger::CashError, &[StartPrepare, StartDispense], Action::Record)
}

/// The kiosk: sale workflow on top of the cash controller.
///
/// Every entry point returns the events published while handling it, in
/// publication order.
///
/// # Example
///
/// ```rust
/// use cashflow::config::KioskConfig;
/// use cashflow::device::{ChangerSignal, PrepareOutcome, ValidatorSignal};
/// use cashflow::fsm::{Collaborators, Kiosk, KioskEvent, KioskState};
/// use cashflow::sim::{CallLog, SimChanger, SimPreparer, SimValidator};
/// use cashflow::timer::ManualTimers;
///
/// let log = CallLog::new();
/// let config = KioskConfig::builder().product("tea", 30).build();
/// let mut kiosk = Kiosk::new(
///     config,
///     Collaborators {
///         changer: Box::new(SimChanger::new(log.clone())),
///         validator: Box::new(SimValidator::new(log.clone())),
///         preparer: Box::new(SimPreparer::new(log.clone())),
///         timers: Box::new(ManualTimers::new()),
///     },
/// )
/// .unwrap();
///
/// kiosk.start();
/// kiosk.on_changer(ChangerSignal::Online);
/// kiosk.on_changer(ChangerSignal::Initialized);
/// kiosk.on_validator(ValidatorSignal::Online);
/// let events = kiosk.on_validator(ValidatorSignal::Initialized);
/// assert_eq!(events, vec![KioskEvent::Ready]);
///
/// kiosk.sell("tea".into());
/// kiosk.on_changer(ChangerSignal::CoinIn(30));
/// assert_eq!(kiosk.state(), KioskState::StartPrepare);
///
/// kiosk.on_prepared(PrepareOutcome::Prepared);
/// assert_eq!(kiosk.state(), KioskState::Ready);
/// ```
pub struct Kiosk {
    cash: CashFsm,
    preparer: Box<dyn Preparer>,
    machine: Machine<KioskState, Trigger, Check, Action>,
    products: BTreeMap<ProductId, Amount>,
    policy: FaultPolicy,
    service: ServiceStatus,
    last_error: Option<Fault>,
    product: Option<ProductId>,
    inbox: VecDeque<CashEvent>,
}

impl Kiosk {
    /// Assemble a kiosk. The configuration is validated first.
    pub fn new(config: KioskConfig, parts: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.history_capacity;
        let changer = ChangerFsm::new(parts.changer, capacity);
        let validator = ValidatorFsm::new(parts.validator, capacity);
        let cash = CashFsm::new(
            changer,
            validator,
            parts.timers,
            config.accept_timeout(),
            capacity,
        );
        Ok(Self {
            cash,
            preparer: parts.preparer,
            machine: Machine::new("kiosk", KioskState::Init, table(), capacity),
            products: config.products,
            policy: config.fault_policy,
            service: ServiceStatus::InService,
            last_error: None,
            product: None,
            inbox: VecDeque::new(),
        })
    }

    pub fn state(&self) -> KioskState {
        self.machine.current()
    }

    pub fn cash_state(&self) -> CashState {
        self.cash.state()
    }

    pub fn changer_state(&self) -> ChangerState {
        self.cash.changer_state()
    }

    pub fn validator_state(&self) -> ValidatorState {
        self.cash.validator_state()
    }

    pub fn history(&self) -> &StateHistory<KioskState> {
        self.machine.history()
    }

    pub fn cash_history(&self) -> &StateHistory<CashState> {
        self.cash.history()
    }

    pub fn service_status(&self) -> &ServiceStatus {
        &self.service
    }

    /// True while a fatal fault keeps the kiosk out of service.
    pub fn has_error(&self) -> bool {
        matches!(self.service, ServiceStatus::OutOfService(_))
    }

    /// Most recent fault reported by the cash controller.
    pub fn last_error(&self) -> Option<&Fault> {
        self.last_error.as_ref()
    }

    /// Product of the sale in progress.
    pub fn product(&self) -> Option<&ProductId> {
        self.product.as_ref()
    }

    pub fn price(&self, product: &ProductId) -> Option<Amount> {
        self.products.get(product).copied()
    }

    pub fn deposit_amount(&self) -> Amount {
        self.cash.deposit_amount()
    }

    pub fn dispense_amount(&self) -> Amount {
        self.cash.dispense_amount()
    }

    pub fn coin_amount(&self) -> Amount {
        self.cash.coin_amount()
    }

    pub fn bill_amount(&self) -> Amount {
        self.cash.bill_amount()
    }

    pub fn total_amount(&self) -> Amount {
        self.cash.total_amount()
    }

    pub fn set_bill_amount(&mut self, amount: Amount) {
        self.cash.set_bill_amount(amount);
    }

    pub fn start(&mut self) -> Vec<KioskEvent> {
        let mut out = Vec::new();
        self.fire(Trigger::Start, &mut out);
        self.settle(out)
    }

    /// Shut the devices down. The accept timer is cancelled; states are kept.
    pub fn stop(&mut self) {
        info!("stopping kiosk");
        self.cash.stop();
    }

    /// Start selling `product`.
    pub fn sell(&mut self, product: ProductId) -> Vec<KioskEvent> {
        let mut out = Vec::new();
        let check = Check {
            known_product: self.products.contains_key(&product),
            in_service: !self.has_error(),
            cash_ready: self.cash.is_ready(),
        };
        if let Some(action) = self.machine.fire(Trigger::Sell, &check) {
            match action {
                Action::BeginSale => self.begin_sale(product),
                _ => self.refuse_sale(&product, &check, &mut out),
            }
        }
        self.settle(out)
    }

    pub fn on_changer(&mut self, signal: ChangerSignal) -> Vec<KioskEvent> {
        let events = self.cash.on_changer(signal);
        self.inbox.extend(events);
        self.settle(Vec::new())
    }

    pub fn on_validator(&mut self, signal: ValidatorSignal) -> Vec<KioskEvent> {
        let events = self.cash.on_validator(signal);
        self.inbox.extend(events);
        self.settle(Vec::new())
    }

    pub fn on_prepared(&mut self, outcome: PrepareOutcome) -> Vec<KioskEvent> {
        let trigger = match outcome {
            PrepareOutcome::Prepared => Trigger::Prepared,
            PrepareOutcome::NotPrepared => Trigger::NotPrepared,
        };
        let mut out = Vec::new();
        self.fire(trigger, &mut out);
        self.settle(out)
    }

    pub fn on_timer(&mut self, handle: TimerHandle) -> Vec<KioskEvent> {
        let events = self.cash.on_timer(handle);
        self.inbox.extend(events);
        self.settle(Vec::new())
    }

    /// Return to service after an operator cleared a fatal fault.
    pub fn reset_service(&mut self) -> Vec<KioskEvent> {
        if let ServiceStatus::OutOfService(fault) = &self.service {
            info!(%fault, "service restored");
        }
        self.service = ServiceStatus::InService;
        if self.state() == KioskState::Ready {
            vec![KioskEvent::Ready]
        } else {
            Vec::new()
        }
    }

    pub fn snapshot(&self) -> KioskSnapshot {
        KioskSnapshot {
            version: SNAPSHOT_VERSION,
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kiosk: self.state(),
            cash: self.cash.state(),
            changer: self.cash.changer_state(),
            validator: self.cash.validator_state(),
            changer_status: self.cash.changer_status(),
            validator_status: self.cash.validator_status(),
            service: self.service.clone(),
            last_error: self.last_error.clone(),
            product: self.product.clone(),
            deposit_amount: self.deposit_amount(),
            dispense_amount: self.dispense_amount(),
            coin_amount: self.coin_amount(),
            bill_amount: self.bill_amount(),
            total_amount: self.total_amount(),
            owed_amount: self.cash.owed_amount(),
            history: self.machine.history().clone(),
        }
    }

    fn settle(&mut self, mut out: Vec<KioskEvent>) -> Vec<KioskEvent> {
        while let Some(event) = self.inbox.pop_front() {
            self.on_cash_event(event, &mut out);
        }
        out
    }

    fn on_cash_event(&mut self, event: CashEvent, out: &mut Vec<KioskEvent>) {
        match event {
            CashEvent::Ready => self.fire(Trigger::CashReady, out),
            CashEvent::Accepted(amount) => {
                out.push(KioskEvent::Accepted(amount));
                self.fire(Trigger::Accepted, out);
            }
            CashEvent::NotAccepted => {
                out.push(KioskEvent::NotAccepted);
                self.fire(Trigger::NotAccepted, out);
            }
            CashEvent::Dispensed(amount) => {
                out.push(KioskEvent::Dispensed(amount));
                self.fire(Trigger::Dispensed, out);
            }
            CashEvent::Error(fault) => self.on_fault(fault, out),
            CashEvent::Telemetry(telemetry) => out.push(KioskEvent::Telemetry(telemetry)),
        }
    }

    fn check(&self) -> Check {
        Check {
            known_product: self.product.is_some(),
            in_service: !self.has_error(),
            cash_ready: self.cash.is_ready(),
        }
    }

    fn fire(&mut self, trigger: Trigger, out: &mut Vec<KioskEvent>) {
        let check = self.check();
        let Some(action) = self.machine.fire(trigger, &check) else {
            return;
        };
        match action {
            Action::StartCash => {
                info!("starting kiosk");
                let events = self.cash.start();
                self.inbox.extend(events);
            }
            Action::AnnounceReady => {
                self.product = None;
                out.push(KioskEvent::Ready);
            }
            Action::ResetSell => {
                info!("sale not paid");
                self.product = None;
                out.push(KioskEvent::ResetSell);
                out.push(KioskEvent::Ready);
            }
            Action::Prepare => {
                if let Some(product) = &self.product {
                    info!(%product, "preparing");
                    self.preparer.prepare(product);
                }
            }
            Action::DispenseChange => {
                let events = self.cash.dispense_change();
                self.inbox.extend(events);
            }
            Action::DispenseAll => {
                warn!("preparation failed, returning payment");
                let events = self.cash.dispense_all();
                self.inbox.extend(events);
            }
            Action::AnnounceError => {
                self.product = None;
                // A fault raised in this same pass has been published already.
                if let Some(fault) = self.current_fault() {
                    let event = KioskEvent::Error(fault);
                    if !out.contains(&event) {
                        out.push(event);
                    }
                }
            }
            // Sale and fault actions need their payload and are handled by
            // `sell` and `on_fault`.
            Action::BeginSale | Action::RefuseSale | Action::Record | Action::AbortSale => {}
        }
    }

    fn on_fault(&mut self, fault: Fault, out: &mut Vec<KioskEvent>) {
        let check = self.check();
        let Some(action) = self.machine.fire(Trigger::CashError, &check) else {
            return;
        };
        if action == Action::AbortSale {
            warn!(%fault, "sale aborted, returning payment");
            let events = self.cash.dispense_all();
            self.inbox.extend(events);
        }
        self.record(&fault);
        out.push(KioskEvent::Error(fault));
    }

    fn record(&mut self, fault: &Fault) {
        self.last_error = Some(fault.clone());
        if self.policy.is_fatal(fault) && !self.has_error() {
            warn!(%fault, "fatal fault, kiosk out of service");
            self.service = ServiceStatus::OutOfService(fault.clone());
        }
    }

    /// Fault explaining why the kiosk cannot sell.
    fn current_fault(&self) -> Option<Fault> {
        match &self.service {
            ServiceStatus::OutOfService(fault) => Some(fault.clone()),
            ServiceStatus::InService => self.last_error.clone(),
        }
    }

    fn begin_sale(&mut self, product: ProductId) {
        let Some(price) = self.price(&product) else {
            return;
        };
        info!(%product, price, "sale started");
        self.product = Some(product);
        let events = self.cash.accept(price);
        self.inbox.extend(events);
    }

    fn refuse_sale(&mut self, product: &ProductId, check: &Check, out: &mut Vec<KioskEvent>) {
        out.push(KioskEvent::ResetSell);
        if !check.known_product {
            warn!(%product, "unknown product");
            out.push(KioskEvent::Ready);
            return;
        }
        warn!(%product, in_service = check.in_service, "sale refused");
        match self.current_fault() {
            Some(fault) => out.push(KioskEvent::Error(fault)),
            None => out.push(KioskEvent::Ready),
        }
    }
}
