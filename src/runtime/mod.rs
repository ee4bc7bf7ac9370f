// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The cooperative scheduler: tasklets, timers, and the platform HAL traits
//! every other subsystem is built on top of (`SPEC_FULL.md` §4.1, §5, §6).

pub mod platform;
pub mod stack;
pub mod tasklet;
pub mod timer;

pub use platform::Platform;
pub use stack::Stack;
pub use tasklet::{Tasklet, TaskletQueue};
pub use timer::{Timer, TimerClient, TimerList};
