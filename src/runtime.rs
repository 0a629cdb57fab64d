//! Async shell around a [`Kiosk`].
//!
//! The kiosk itself is synchronous. [`KioskRuntime`] owns it inside a single
//! tokio task and feeds it driver signals, preparation results, timer
//! expiries and operator commands from one queue, so every input is handled
//! to completion before the next one starts. Published events are broadcast
//! to every subscriber of the [`KioskHandle`].

use crate::config::{ConfigError, KioskConfig};
use crate::device::{
    BillValidator, ChangerSignal, CoinChanger, PrepareOutcome, Preparer, ValidatorSignal,
};
use crate::fsm::{Collaborators, Kiosk, KioskEvent};
use crate::snapshot::KioskSnapshot;
use crate::timer::{TimerHandle, TimerService};
use crate::types::{Amount, ProductId};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Events kept for slow subscribers before they start lagging.
pub const EVENT_BUFFER: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("kiosk runtime has stopped")]
    Stopped,
}

/// Operator commands.
#[derive(Debug)]
pub enum Command {
    Start,
    Stop,
    Sell(ProductId),
    ResetService,
    SetBillAmount(Amount),
    Snapshot(oneshot::Sender<KioskSnapshot>),
    Shutdown,
}

/// Everything the runtime task reacts to.
#[derive(Debug)]
pub enum Input {
    Changer(ChangerSignal),
    Validator(ValidatorSignal),
    Prepared(PrepareOutcome),
    Timer(TimerHandle),
    Command(Command),
}

/// Timers backed by `tokio::time`. Expiry is delivered as [`Input::Timer`].
///
/// Must be used from within a tokio runtime.
pub struct TokioTimers {
    inputs: mpsc::UnboundedSender<Input>,
    next: u64,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
}

impl TokioTimers {
    pub fn new(inputs: mpsc::UnboundedSender<Input>) -> Self {
        Self {
            inputs,
            next: 0,
            tasks: HashMap::new(),
        }
    }
}

impl TimerService for TokioTimers {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.tasks.retain(|_, task| !task.is_finished());
        self.next += 1;
        let handle = TimerHandle(self.next);
        let inputs = self.inputs.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inputs.send(Input::Timer(handle));
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

/// Cloneable front end of a running kiosk.
#[derive(Clone, Debug)]
pub struct KioskHandle {
    inputs: mpsc::UnboundedSender<Input>,
    events: broadcast::Sender<KioskEvent>,
}

impl KioskHandle {
    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.events.subscribe()
    }

    pub fn send(&self, input: Input) -> Result<(), RuntimeError> {
        self.inputs.send(input).map_err(|_| RuntimeError::Stopped)
    }

    pub fn changer(&self, signal: ChangerSignal) -> Result<(), RuntimeError> {
        self.send(Input::Changer(signal))
    }

    pub fn validator(&self, signal: ValidatorSignal) -> Result<(), RuntimeError> {
        self.send(Input::Validator(signal))
    }

    pub fn prepared(&self, outcome: PrepareOutcome) -> Result<(), RuntimeError> {
        self.send(Input::Prepared(outcome))
    }

    pub fn start(&self) -> Result<(), RuntimeError> {
        self.send(Input::Command(Command::Start))
    }

    pub fn stop(&self) -> Result<(), RuntimeError> {
        self.send(Input::Command(Command::Stop))
    }

    pub fn sell(&self, product: impl Into<ProductId>) -> Result<(), RuntimeError> {
        self.send(Input::Command(Command::Sell(product.into())))
    }

    pub fn reset_service(&self) -> Result<(), RuntimeError> {
        self.send(Input::Command(Command::ResetService))
    }

    pub fn set_bill_amount(&self, amount: Amount) -> Result<(), RuntimeError> {
        self.send(Input::Command(Command::SetBillAmount(amount)))
    }

    /// Snapshot taken between two inputs.
    pub async fn snapshot(&self) -> Result<KioskSnapshot, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Input::Command(Command::Snapshot(tx)))?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Ask the runtime task to finish after the inputs already queued.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        self.send(Input::Command(Command::Shutdown))
    }
}

/// Single-task owner of a [`Kiosk`].
///
/// # Example
///
/// ```rust
/// use cashflow::config::KioskConfig;
/// use cashflow::runtime::KioskRuntime;
/// use cashflow::sim::{CallLog, SimChanger, SimPreparer, SimValidator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let log = CallLog::new();
/// let config = KioskConfig::builder().product("tea", 30).build();
/// let (runtime, handle) = KioskRuntime::new(
///     config,
///     Box::new(SimChanger::new(log.clone())),
///     Box::new(SimValidator::new(log.clone())),
///     Box::new(SimPreparer::new(log.clone())),
/// )
/// .unwrap();
///
/// let task = tokio::spawn(runtime.run());
/// handle.start().unwrap();
/// handle.shutdown().unwrap();
/// let kiosk = task.await.unwrap();
/// assert_eq!(kiosk.state(), cashflow::fsm::KioskState::WaitReady);
/// # }
/// ```
pub struct KioskRuntime {
    kiosk: Kiosk,
    inputs: mpsc::UnboundedReceiver<Input>,
    events: broadcast::Sender<KioskEvent>,
}

impl KioskRuntime {
    /// Build the kiosk with [`TokioTimers`] and return it with its handle.
    pub fn new(
        config: KioskConfig,
        changer: Box<dyn CoinChanger>,
        validator: Box<dyn BillValidator>,
        preparer: Box<dyn Preparer>,
    ) -> Result<(Self, KioskHandle), ConfigError> {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let kiosk = Kiosk::new(
            config,
            Collaborators {
                changer,
                validator,
                preparer,
                timers: Box::new(TokioTimers::new(input_tx.clone())),
            },
        )?;
        let handle = KioskHandle {
            inputs: input_tx,
            events: events.clone(),
        };
        Ok((
            Self {
                kiosk,
                inputs: input_rx,
                events,
            },
            handle,
        ))
    }

    /// Process inputs until [`Command::Shutdown`], then hand the kiosk back.
    pub async fn run(mut self) -> Kiosk {
        info!("kiosk runtime started");
        while let Some(input) = self.inputs.recv().await {
            debug!(?input, "input");
            let events = match input {
                Input::Changer(signal) => self.kiosk.on_changer(signal),
                Input::Validator(signal) => self.kiosk.on_validator(signal),
                Input::Prepared(outcome) => self.kiosk.on_prepared(outcome),
                Input::Timer(handle) => self.kiosk.on_timer(handle),
                Input::Command(Command::Start) => self.kiosk.start(),
                Input::Command(Command::Stop) => {
                    self.kiosk.stop();
                    Vec::new()
                }
                Input::Command(Command::Sell(product)) => self.kiosk.sell(product),
                Input::Command(Command::ResetService) => self.kiosk.reset_service(),
                Input::Command(Command::SetBillAmount(amount)) => {
                    self.kiosk.set_bill_amount(amount);
                    Vec::new()
                }
                Input::Command(Command::Snapshot(reply)) => {
                    let _ = reply.send(self.kiosk.snapshot());
                    Vec::new()
                }
                Input::Command(Command::Shutdown) => break,
            };
            self.publish(events);
        }
        info!(state = %self.kiosk.state(), "kiosk runtime stopped");
        self.kiosk
    }

    fn publish(&self, events: Vec<KioskEvent>) {
        for event in events {
            if self.events.send(event).is_err() {
                trace!("no event subscribers");
            }
        }
    }
}
