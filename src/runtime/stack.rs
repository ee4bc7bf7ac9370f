// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `Config` and `Stack`: the single value a platform's `main` owns and passes
//! by reference into every handler (`SPEC_FULL.md` §9, "Global singletons for
//! scheduler state and route tables").

use crate::error::{Result, ThreadError};
use crate::runtime::platform::Atomic;
use crate::runtime::tasklet::TaskletQueue;
use crate::runtime::timer::TimerList;

/// Configuration supplied by the platform at startup (`SPEC_FULL.md` §10.3).
/// There is no persisted state at the core level: every field here comes
/// from the embedder, every time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    pub master_key: [u8; 16],
    pub network_name: [u8; 16],
    pub network_name_len: u8,
    pub channel: u8,
    pub pan_id: u16,
    pub extended_pan_id: [u8; 8],
    /// MLE Mode TLV bits, see `DESIGN.md` for the bit layout decision.
    pub mode: u8,
}

impl Config {
    /// Validates the configuration eagerly; rejected rather than asserted
    /// (`SPEC_FULL.md` §10.3).
    pub fn validate(&self) -> Result<()> {
        if !(11..=26).contains(&self.channel) {
            return Err(ThreadError::InvalidArgs);
        }
        if self.network_name_len as usize > self.network_name.len() {
            return Err(ThreadError::InvalidArgs);
        }
        Ok(())
    }
}

/// The runtime's scheduler state: tasklet queue and timer list. Subsystems
/// (MAC, MLE, 6LoWPAN reassembly, address resolver) each own their own
/// [`crate::runtime::tasklet::Tasklet`]/[`crate::runtime::timer::Timer`]
/// instances and register them with this `Stack`'s queue/list; this type
/// does not itself know about any protocol layer above the runtime, keeping
/// the dependency direction one-way (runtime has no knowledge of MAC/MLE/...).
pub struct Stack<'a> {
    config: Config,
    tasklets: TaskletQueue<'a>,
    timers: TimerList<'a>,
}

impl<'a> Stack<'a> {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tasklets: TaskletQueue::new(),
            timers: TimerList::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tasklets(&self) -> &TaskletQueue<'a> {
        &self.tasklets
    }

    pub fn timers(&self) -> &TimerList<'a> {
        &self.timers
    }

    /// `process_next_tasklet()`: runs exactly one pending tasklet, if any.
    pub fn process<At: Atomic>(&self, atomic: &At) -> bool {
        self.tasklets.process_next(atomic)
    }

    /// `are_tasklets_pending()`: whether the platform's main loop should call
    /// `process` again instead of sleeping (`SPEC_FULL.md` §4.1: "if no
    /// tasklets pending and no external I/O ready, sleep until interrupt").
    pub fn has_work<At: Atomic>(&self, atomic: &At) -> bool {
        self.tasklets.has_pending(atomic)
    }
}
