//! Background thread that owns the [`Simulation`].
//!
//! The thread shares no memory with the main side. It blocks on the command
//! channel while idle, and while running drains pending commands once per
//! frame before integrating. Stopping is cooperative: a `Stop` takes effect at
//! the next frame boundary.

use std::{
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, trace};

use super::{
    ForceSettings,
    protocol::{WorkerCommand, WorkerMessage},
    simulation::{Simulation, StepOutcome},
};
use crate::error::LayoutError;

/// Main-side ends of the worker's channels.
#[derive(Debug)]
pub(super) struct WorkerHandle {
    pub(super) commands: Sender<WorkerCommand>,
    pub(super) messages: Receiver<WorkerMessage>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns the worker thread
    pub(super) fn spawn() -> Result<Self, LayoutError> {
        let (command_tx, command_rx) = mpsc::channel();
        let (message_tx, message_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("astrolabe-force".to_string())
            .spawn(move || Worker::new(message_tx).run(command_rx))
            .map_err(|err| LayoutError::Worker(err.to_string()))?;
        debug!("Force worker spawned");
        Ok(Self {
            commands: command_tx,
            messages: message_rx,
            thread: Some(thread),
        })
    }

    /// Sends `Shutdown` and waits for the thread to exit
    pub(super) fn shutdown(mut self) {
        // The worker may already be gone; joining below still reaps it.
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Force worker panicked");
            }
        }
        debug!("Force worker shut down");
    }
}

struct Worker {
    simulation: Simulation,
    running: bool,
    messages: Sender<WorkerMessage>,
}

impl Worker {
    fn new(messages: Sender<WorkerMessage>) -> Self {
        Self {
            simulation: Simulation::new(ForceSettings::default()),
            running: false,
            messages,
        }
    }

    fn run(mut self, commands: Receiver<WorkerCommand>) {
        loop {
            if !self.running {
                match commands.recv() {
                    Ok(command) => {
                        if !self.handle(command) {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }

            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        if !self.handle(command) {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            if self.running {
                self.frame();
                let interval = self.simulation.settings().frame_interval_ms;
                if interval > 0 {
                    thread::sleep(Duration::from_millis(interval));
                }
            }
        }
    }

    /// Applies one command; returns false when the loop must end
    fn handle(&mut self, command: WorkerCommand) -> bool {
        trace!(command:? = command; "Force worker command");
        match command {
            WorkerCommand::Init {
                bodies,
                springs,
                settings,
            } => {
                self.simulation.set_settings(settings);
                self.simulation.load(bodies, springs);
            }
            WorkerCommand::Start => {
                self.simulation.reset_calm();
                self.running = true;
            }
            WorkerCommand::Stop => {
                if self.running {
                    self.running = false;
                    self.send(WorkerMessage::Stopped {
                        energy: self.simulation.energy(),
                    });
                }
            }
            WorkerCommand::Kick { intensity } => {
                self.simulation.kick(intensity);
                self.running = true;
            }
            WorkerCommand::AddNode(body) => self.simulation.add_body(body),
            WorkerCommand::RemoveNode(id) => self.simulation.remove_body(id),
            WorkerCommand::AddEdge(spring) => self.simulation.add_spring(spring),
            WorkerCommand::RemoveEdge(id) => self.simulation.remove_spring(id),
            WorkerCommand::UpdateNodeState {
                node,
                is_fixed,
                is_pinned,
                position,
            } => self
                .simulation
                .update_body_state(node, is_fixed, is_pinned, position),
            WorkerCommand::UpdateSettings(settings) => self.simulation.set_settings(settings),
            WorkerCommand::Shutdown => return false,
        }
        true
    }

    fn frame(&mut self) {
        match self.simulation.advance() {
            Ok(outcome) => {
                let settled = outcome == StepOutcome::Settled;
                let every = self.simulation.settings().update_every.max(1);
                if settled || self.simulation.steps() % every == 0 {
                    self.send(WorkerMessage::PositionsUpdate {
                        positions: self.simulation.positions(),
                        energy: self.simulation.energy(),
                    });
                }
                if settled {
                    debug!(
                        steps = self.simulation.steps(),
                        energy = self.simulation.energy();
                        "Force simulation settled"
                    );
                    self.running = false;
                    self.send(WorkerMessage::Stopped {
                        energy: self.simulation.energy(),
                    });
                }
            }
            Err(err) => {
                error!(err:% = err; "Force simulation failed");
                self.running = false;
                self.send(WorkerMessage::Error {
                    error: err.to_string(),
                });
            }
        }
    }

    fn send(&self, message: WorkerMessage) {
        if self.messages.send(message).is_err() {
            trace!("Force layout dropped its message receiver");
        }
    }
}
