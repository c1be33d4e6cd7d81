// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Unix signal handling.
//!
//! The operator talks to the daemon with signals:
//! * SIGUSR1 asks for a resync at the next tick.
//! * SIGINT and SIGTERM ask for a graceful shutdown.
//!
//! A single dispatcher is installed with sigaction for every signal of interest, and looks up the
//! callback to run in a table. Callbacks run in interrupted context, they must stick to flipping
//! atomics.

use std::collections::HashMap;
use std::io::Result;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, PoisonError};

use lazy_static::lazy_static;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{error, info};

use crate::{FORCE_RESYNC_PENDING, SHUTDOWN_REQUESTED};

type Callback = fn();

lazy_static! {
    /// Callbacks registered per signal. Last registration wins.
    static ref CALLBACKS: Mutex<HashMap<Signal, Callback>> = Mutex::new(HashMap::new());
}

extern "C" fn dispatch(signum: libc::c_int) {
    // The interrupted thread may be the one registering a callback. Never block here.
    let Ok(callbacks) = CALLBACKS.try_lock() else {
        return;
    };

    if let Some(callback) = Signal::try_from(signum)
        .ok()
        .and_then(|sig| callbacks.get(&sig))
    {
        callback()
    }
}

/// Install the dispatcher for `sig`.
fn enable_signal(sig: Signal) -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(dispatch),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    // SAFETY: the dispatcher only touches a try-locked table and atomics.
    match unsafe { signal::sigaction(sig, &action) } {
        Ok(_) => Ok(()),
        Err(errno) => Err(std::io::Error::from_raw_os_error(errno as i32)),
    }
}

/// Register `callback` to run when `sig` is received. Should be called from the main thread.
pub fn register_signal_callback(sig: Signal, callback: Callback) -> Result<()> {
    CALLBACKS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(sig, callback);

    match enable_signal(sig) {
        Ok(()) => {
            info!("Registered callback for signal {}", sig);
            Ok(())
        }
        Err(e) => {
            error!("Failed to register callback for signal {}: {}", sig, e);
            Err(e)
        }
    }
}

fn on_force_resync() {
    FORCE_RESYNC_PENDING.store(true, Ordering::SeqCst);
}

fn on_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Register the operator signals of the daemon.
pub fn register_operator_signals() -> Result<()> {
    register_signal_callback(Signal::SIGUSR1, on_force_resync)?;
    register_signal_callback(Signal::SIGINT, on_shutdown)?;
    register_signal_callback(Signal::SIGTERM, on_shutdown)?;
    Ok(())
}
