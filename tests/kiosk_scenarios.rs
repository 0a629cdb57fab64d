//! End-to-end sales against simulated devices.

mod common;

use cashflow::device::{ChangerSignal, PrepareOutcome, ValidatorSignal};
use cashflow::fsm::{CashState, KioskEvent, KioskState, ServiceStatus};
use cashflow::sim::{Call, ChangePolicy};
use cashflow::types::{DeviceKind, Fault, ProductId};
use common::{without_telemetry, Harness};

#[test]
fn exact_coins() {
    let mut h = Harness::ready();

    assert!(h.kiosk.sell("tea".into()).is_empty());
    assert_eq!(h.kiosk.state(), KioskState::StartSell);

    assert!(without_telemetry(h.coin(10)).is_empty());
    assert_eq!(without_telemetry(h.coin(20)), vec![KioskEvent::Accepted(30)]);
    assert_eq!(h.kiosk.state(), KioskState::StartPrepare);
    assert!(h.log.contains(&Call::Prepare(ProductId::from("tea"))));

    let events = h.kiosk.on_prepared(PrepareOutcome::Prepared);

    assert_eq!(
        without_telemetry(events),
        vec![KioskEvent::Dispensed(0), KioskEvent::Ready]
    );
    assert_eq!(h.kiosk.state(), KioskState::Ready);
    assert!(h.log.dispensed().is_empty());
    assert_eq!(h.kiosk.deposit_amount(), 0);
    assert_eq!(h.kiosk.product(), None);
}

#[test]
fn overpayment_with_change() {
    let mut h = Harness::ready();
    h.kiosk.sell("tea".into());

    assert_eq!(without_telemetry(h.bill(50)), vec![KioskEvent::Accepted(50)]);
    assert_eq!(h.kiosk.dispense_amount(), 20);
    assert_eq!(h.kiosk.bill_amount(), 50);

    h.kiosk.on_prepared(PrepareOutcome::Prepared);
    assert_eq!(h.log.dispensed(), vec![20]);
    assert_eq!(h.kiosk.state(), KioskState::StartDispense);

    let events = h.pay_out(20);
    assert_eq!(
        without_telemetry(events),
        vec![KioskEvent::Dispensed(20), KioskEvent::Ready]
    );
    assert_eq!(h.kiosk.state(), KioskState::Ready);
    assert_eq!(h.kiosk.dispense_amount(), 0);
}

#[test]
fn mixed_payment_in_several_steps() {
    let mut h = Harness::ready();
    h.kiosk.sell("soup".into());

    assert!(without_telemetry(h.bill(20)).is_empty());
    assert!(without_telemetry(h.bill(20)).is_empty());
    assert_eq!(h.kiosk.deposit_amount(), 40);
    assert_eq!(h.kiosk.cash_state(), CashState::AcceptAmount);

    assert_eq!(without_telemetry(h.coin(5)), vec![KioskEvent::Accepted(45)]);
    assert_eq!(h.log.count(&Call::StackBill), 2);
}

#[test]
fn bill_rejected_when_change_is_impossible() {
    let mut h = Harness::ready();
    h.changer.set_policy(ChangePolicy::Never);
    h.kiosk.sell("tea".into());

    assert!(h.bill(50).is_empty());

    assert!(h.log.contains(&Call::ReturnBill));
    assert!(!h.log.contains(&Call::StackBill));
    assert_eq!(h.kiosk.state(), KioskState::StartSell);
    assert_eq!(h.kiosk.deposit_amount(), 0);

    // Exact coins still complete the sale.
    h.coin(10);
    assert_eq!(without_telemetry(h.coin(20)), vec![KioskEvent::Accepted(30)]);
}

#[test]
fn device_fault_mid_accept_refunds_and_stays_out_of_service() {
    let mut h = Harness::ready();
    let jam = Fault::device(DeviceKind::Validator, 3, "bill jam");
    h.kiosk.sell("tea".into());
    h.coin(10);

    let events = h.kiosk.on_validator(ValidatorSignal::Error {
        code: 3,
        text: "bill jam".into(),
    });

    assert_eq!(without_telemetry(events), vec![KioskEvent::Error(jam.clone())]);
    assert_eq!(h.kiosk.state(), KioskState::StartDispense);
    assert_eq!(h.log.dispensed(), vec![10]);
    assert!(h.kiosk.has_error());

    let events = h.pay_out(10);
    assert_eq!(
        without_telemetry(events),
        vec![KioskEvent::Dispensed(10), KioskEvent::Error(jam.clone())]
    );
    assert_eq!(h.kiosk.state(), KioskState::Error);

    // The validator comes back, but the fault is sticky.
    h.kiosk.on_validator(ValidatorSignal::Offline);
    h.kiosk.on_validator(ValidatorSignal::Online);
    assert_eq!(
        h.kiosk.on_validator(ValidatorSignal::Initialized),
        vec![KioskEvent::Ready]
    );
    assert_eq!(h.kiosk.state(), KioskState::Ready);
    assert_eq!(h.kiosk.service_status(), &ServiceStatus::OutOfService(jam.clone()));

    assert_eq!(
        h.kiosk.sell("tea".into()),
        vec![KioskEvent::ResetSell, KioskEvent::Error(jam)]
    );
    assert_eq!(h.kiosk.state(), KioskState::Ready);

    assert_eq!(h.kiosk.reset_service(), vec![KioskEvent::Ready]);
    h.kiosk.sell("tea".into());
    assert_eq!(h.kiosk.state(), KioskState::StartSell);
}

#[test]
fn timeout_returns_partial_payment_once() {
    let mut h = Harness::ready();
    h.kiosk.sell("tea".into());
    h.coin(10);
    h.log.take();

    let events = h.expire();

    assert_eq!(
        without_telemetry(events),
        vec![
            KioskEvent::NotAccepted,
            KioskEvent::ResetSell,
            KioskEvent::Ready
        ]
    );
    assert_eq!(h.log.dispensed(), vec![10]);
    assert_eq!(h.kiosk.state(), KioskState::Ready);
    assert_eq!(h.kiosk.deposit_amount(), 0);

    assert_eq!(without_telemetry(h.pay_out(10)), vec![KioskEvent::Dispensed(10)]);
    assert!(h.expire().is_empty());
}

#[test]
fn lost_connection_is_recoverable() {
    let mut h = Harness::ready();
    let offline = Fault::offline(DeviceKind::Changer);

    assert_eq!(
        h.kiosk.on_changer(ChangerSignal::Offline),
        vec![KioskEvent::Error(offline.clone())]
    );
    assert_eq!(h.kiosk.state(), KioskState::Error);
    assert!(!h.kiosk.has_error());
    assert_eq!(h.kiosk.last_error(), Some(&offline));

    h.kiosk.on_changer(ChangerSignal::Online);
    assert_eq!(
        h.kiosk.on_changer(ChangerSignal::Initialized),
        vec![KioskEvent::Ready]
    );

    h.kiosk.sell("tea".into());
    assert_eq!(h.kiosk.state(), KioskState::StartSell);
}

#[test]
fn unknown_product_is_refused() {
    let mut h = Harness::ready();

    let events = h.kiosk.sell("coffee".into());

    assert_eq!(events, vec![KioskEvent::ResetSell, KioskEvent::Ready]);
    assert_eq!(h.kiosk.state(), KioskState::Ready);
    assert!(h.log.calls().is_empty());
}

#[test]
fn failed_preparation_returns_everything() {
    let mut h = Harness::ready();
    h.kiosk.sell("tea".into());
    h.coin(50);

    h.kiosk.on_prepared(PrepareOutcome::NotPrepared);
    assert_eq!(h.log.dispensed(), vec![50]);

    assert_eq!(
        without_telemetry(h.pay_out(50)),
        vec![KioskEvent::Dispensed(50), KioskEvent::Ready]
    );
}

#[test]
fn second_sell_during_sale_is_ignored() {
    let mut h = Harness::ready();
    h.kiosk.sell("tea".into());

    assert!(h.kiosk.sell("soup".into()).is_empty());
    assert_eq!(h.kiosk.product(), Some(&ProductId::from("tea")));
}

#[test]
fn change_owed_by_lost_changer_is_paid_after_reconnect() {
    let mut h = Harness::ready();
    h.kiosk.sell("tea".into());
    h.coin(50);
    h.kiosk.on_prepared(PrepareOutcome::Prepared);
    assert_eq!(h.log.dispensed(), vec![20]);

    let events = h.kiosk.on_changer(ChangerSignal::Offline);

    assert!(events.contains(&KioskEvent::Error(Fault::offline(DeviceKind::Changer))));
    assert_eq!(h.kiosk.state(), KioskState::Error);
    assert_eq!(h.kiosk.snapshot().owed_amount, 20);

    h.kiosk.on_changer(ChangerSignal::Online);
    let events = h.kiosk.on_changer(ChangerSignal::Initialized);
    assert!(events.contains(&KioskEvent::Ready));
    assert_eq!(h.log.dispensed(), vec![20, 20]);
    assert_eq!(h.kiosk.snapshot().owed_amount, 0);

    assert!(h.pay_out(20).contains(&KioskEvent::Dispensed(20)));
}

#[test]
fn change_left_by_a_jam_is_paid_after_reconnect() {
    let mut h = Harness::ready();
    let jam = Fault::device(DeviceKind::Changer, 3, "tube jam");
    h.kiosk.sell("tea".into());
    h.coin(50);
    h.kiosk.on_prepared(PrepareOutcome::Prepared);
    assert_eq!(h.log.dispensed(), vec![20]);
    h.pay_out(5);

    let events = h.kiosk.on_changer(ChangerSignal::Error {
        code: 3,
        text: "tube jam".into(),
    });

    assert_eq!(
        without_telemetry(events),
        vec![KioskEvent::Error(jam.clone()), KioskEvent::Dispensed(5)]
    );
    assert_eq!(h.kiosk.state(), KioskState::Error);
    assert_eq!(h.kiosk.snapshot().owed_amount, 15);

    h.kiosk.on_changer(ChangerSignal::Offline);
    h.kiosk.on_changer(ChangerSignal::Online);
    let events = h.kiosk.on_changer(ChangerSignal::Initialized);
    assert!(events.contains(&KioskEvent::Ready));
    assert_eq!(h.log.dispensed(), vec![20, 15]);
    assert_eq!(h.kiosk.snapshot().owed_amount, 0);

    assert!(h.pay_out(15).contains(&KioskEvent::Dispensed(15)));
    // A jam is a device error and keeps the kiosk out of service.
    assert_eq!(h.kiosk.service_status(), &ServiceStatus::OutOfService(jam));
}
