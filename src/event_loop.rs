// Polling loop
// One thread, one cooperative loop. Every tick handles a batch of input, redraws, then drains the
// platform's queued callbacks, which is where all roster, voice and message mutation happens.

use anyhow::Result;
use log::{debug, info};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::app::App;
use crate::platform::{Client, Deadlines};
use crate::roster::Roster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// The UI side of the loop
pub trait Frontend {
    /// Handle whatever input is pending without blocking
    fn process_input(&mut self) -> Result<LoopControl>;
    fn redraw(&mut self) -> Result<()>;
}

pub struct PollingLoop {
    client: Rc<dyn Client>,
    deadlines: Rc<Deadlines>,
    roster: Rc<Roster>,
    interval: Duration,
}

impl PollingLoop {
    pub fn new(app: &App) -> Self {
        PollingLoop {
            client: Rc::clone(app.client()),
            deadlines: Rc::clone(app.deadlines()),
            roster: Rc::clone(app.roster()),
            interval: app.config().tick_interval(),
        }
    }

    pub fn tick<F: Frontend>(&self, frontend: &mut F) -> Result<LoopControl> {
        if frontend.process_input()? == LoopControl::Quit {
            return Ok(LoopControl::Quit);
        }
        self.roster.poll_selection();
        frontend.redraw()?;

        self.client.run_callbacks();
        let expired = self.deadlines.expire(Instant::now());
        if expired > 0 {
            debug!("{} platform requests expired this tick", expired);
        }
        Ok(LoopControl::Continue)
    }

    pub async fn run<F: Frontend>(&self, frontend: &mut F) -> Result<()> {
        info!("Entering main loop, tick every {:?}", self.interval);
        while self.tick(frontend)? == LoopControl::Continue {
            tokio::time::sleep(self.interval).await;
        }
        info!("Main loop finished");
        Ok(())
    }
}
