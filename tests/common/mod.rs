//! Shared kiosk harness for the integration tests.

#![allow(dead_code)]

use cashflow::config::{FaultPolicy, KioskConfig};
use cashflow::device::{ChangerSignal, ValidatorSignal};
use cashflow::fsm::{Collaborators, Kiosk, KioskEvent};
use cashflow::sim::{Call, CallLog, SimChanger, SimPreparer, SimValidator};
use cashflow::timer::ManualTimers;
use cashflow::types::Amount;
use std::time::Duration;

pub const TIMEOUT_SECS: u64 = 60;

pub fn config() -> KioskConfig {
    KioskConfig::builder()
        .product("tea", 30)
        .product("soup", 45)
        .accept_timeout_secs(TIMEOUT_SECS)
        .fault_policy(FaultPolicy::DeviceErrors)
        .build()
}

/// A kiosk wired to simulators, plus handles on the simulators.
pub struct Harness {
    pub kiosk: Kiosk,
    pub log: CallLog,
    pub changer: SimChanger,
    pub validator: SimValidator,
    pub clock: ManualTimers,
}

impl Harness {
    pub fn new(config: KioskConfig) -> Self {
        let log = CallLog::new();
        let changer = SimChanger::new(log.clone());
        let validator = SimValidator::new(log.clone());
        let clock = ManualTimers::new();
        let kiosk = Kiosk::new(
            config,
            Collaborators {
                changer: Box::new(changer.clone()),
                validator: Box::new(validator.clone()),
                preparer: Box::new(SimPreparer::new(log.clone())),
                timers: Box::new(clock.clone()),
            },
        )
        .expect("valid config");
        Self {
            kiosk,
            log,
            changer,
            validator,
            clock,
        }
    }

    /// Started kiosk with both devices initialized and an empty call log.
    pub fn ready() -> Self {
        Self::ready_with(config())
    }

    pub fn ready_with(config: KioskConfig) -> Self {
        let mut harness = Self::new(config);
        harness.kiosk.start();
        harness.kiosk.on_changer(ChangerSignal::Online);
        harness.kiosk.on_changer(ChangerSignal::Initialized);
        harness.kiosk.on_validator(ValidatorSignal::Online);
        let events = harness.kiosk.on_validator(ValidatorSignal::Initialized);
        assert_eq!(events, vec![KioskEvent::Ready]);
        harness.log.take();
        harness
    }

    pub fn coin(&mut self, amount: Amount) -> Vec<KioskEvent> {
        self.kiosk.on_changer(ChangerSignal::CoinIn(amount))
    }

    /// Present a bill and, if the kiosk stacks it, report its capture.
    pub fn bill(&mut self, amount: Amount) -> Vec<KioskEvent> {
        let stacked = self.log.count(&Call::StackBill);
        let mut events = self.kiosk.on_validator(ValidatorSignal::CheckBill(amount));
        if self.log.count(&Call::StackBill) > stacked {
            self.validator.capture(amount);
            events.extend(self.kiosk.on_validator(ValidatorSignal::BillIn(amount)));
        }
        events
    }

    /// Report coins leaving the changer.
    pub fn pay_out(&mut self, amount: Amount) -> Vec<KioskEvent> {
        self.kiosk.on_changer(ChangerSignal::CoinOut(amount))
    }

    /// Let the accept window run out and deliver every expired timer.
    pub fn expire(&mut self) -> Vec<KioskEvent> {
        let fired = self.clock.advance(Duration::from_secs(TIMEOUT_SECS));
        fired
            .into_iter()
            .flat_map(|handle| self.kiosk.on_timer(handle))
            .collect()
    }
}

pub fn without_telemetry(events: Vec<KioskEvent>) -> Vec<KioskEvent> {
    events
        .into_iter()
        .filter(|e| !matches!(e, KioskEvent::Telemetry(_)))
        .collect()
}
