//! Digital I/O objects.
//!
//! A digital input port ([`DigIn`]) reports the high/low value of each of
//! its bits; a digital output port ([`DigOut`]) sets them. Both are served
//! through [`Skeleton`]s built from [`dig_in_table`] and [`dig_out_table`]
//! and called through [`DigInStub`] and [`DigOutStub`].
//!
//! [`SimulatedPort`] is an in-memory bit bank implementing both interfaces,
//! so a value written through the output object reads back through the
//! input object.

use std::sync::{Arc, Mutex};

use cxorb_orb::{remote_interface, ObjectRegistry, Result, Skeleton};
use cxorb_wire::{class, ObjectKey};
use tracing::debug;

/// Operation codes of a digital input port.
pub mod dig_in_op {
    pub const WIDTH: u32 = 0;
    pub const VALUE: u32 = 1;
}

/// Operation codes of a digital output port.
pub mod dig_out_op {
    pub const WIDTH: u32 = 0;
    pub const SET: u32 = 1;
    pub const CLEAR: u32 = 2;
    pub const TOGGLE: u32 = 3;
}

/// Default width of a [`SimulatedPort`].
pub const DEFAULT_WIDTH: u32 = 32;

/// Key of digital input port `instance`.
pub const fn dig_in_key(instance: u16) -> ObjectKey {
    ObjectKey::new(class::DIG_IN, instance)
}

/// Key of digital output port `instance`.
pub const fn dig_out_key(instance: u16) -> ObjectKey {
    ObjectKey::new(class::DIG_OUT, instance)
}

remote_interface! {
    /// A digital input port.
    pub interface DigIn("DigIn") {
        class: class::DIG_IN;
        table: dig_in_table;
        stub: DigInStub;

        /// Number of bits in the port.
        fn width() -> u32 = dig_in_op::WIDTH;
        /// Current value of `bit` (true = high).
        fn value(bit: i32) -> bool = dig_in_op::VALUE;
    }
}

remote_interface! {
    /// A digital output port.
    ///
    /// The level of `set` may be left off the wire; it then defaults to high.
    pub interface DigOut("DigOut") {
        class: class::DIG_OUT;
        table: dig_out_table;
        stub: DigOutStub;

        /// Number of bits in the port.
        fn width() -> u32 = dig_out_op::WIDTH;
        /// Drive `bit` to `high`.
        fn set(bit: i32, high: bool = true) -> () = dig_out_op::SET;
        /// Drive `bit` low.
        fn clear(bit: i32) -> () = dig_out_op::CLEAR;
        /// Invert `bit`.
        fn toggle(bit: i32) -> () = dig_out_op::TOGGLE;
    }
}

/// In-memory bit bank serving as both an input and an output port.
///
/// Clones share the same bits. Bits outside `0..width` read low and
/// writes to them are ignored.
#[derive(Debug, Clone)]
pub struct SimulatedPort {
    bits: Arc<Mutex<Vec<bool>>>,
}

impl SimulatedPort {
    pub fn new(width: u32) -> Self {
        Self {
            bits: Arc::new(Mutex::new(vec![false; width as usize])),
        }
    }

    /// Register this port as digital input and output `instance`.
    pub fn register(&self, registry: &mut ObjectRegistry, instance: u16) -> Result<()> {
        registry.register(
            dig_in_key(instance),
            Skeleton::new(self.clone(), Arc::new(dig_in_table())),
        )?;
        registry.register(
            dig_out_key(instance),
            Skeleton::new(self.clone(), Arc::new(dig_out_table())),
        )
    }

    /// Snapshot of every bit, lowest first.
    pub fn snapshot(&self) -> Vec<bool> {
        self.bits.lock().map(|bits| bits.clone()).unwrap_or_default()
    }

    fn update(&self, bit: i32, f: impl FnOnce(bool) -> bool) {
        let Ok(mut bits) = self.bits.lock() else {
            return;
        };
        match usize::try_from(bit).ok().filter(|&i| i < bits.len()) {
            Some(i) => {
                bits[i] = f(bits[i]);
                debug!(bit, high = bits[i], "simulated output changed");
            }
            None => debug!(bit, "ignoring write to bit outside the port"),
        }
    }
}

impl Default for SimulatedPort {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH)
    }
}

impl DigIn for SimulatedPort {
    fn width(&self) -> u32 {
        self.bits.lock().map(|bits| bits.len() as u32).unwrap_or(0)
    }

    fn value(&self, bit: i32) -> bool {
        let Ok(bits) = self.bits.lock() else {
            return false;
        };
        usize::try_from(bit)
            .ok()
            .and_then(|i| bits.get(i).copied())
            .unwrap_or(false)
    }
}

impl DigOut for SimulatedPort {
    fn width(&self) -> u32 {
        DigIn::width(self)
    }

    fn set(&self, bit: i32, high: bool) {
        self.update(bit, |_| high);
    }

    fn clear(&self, bit: i32) {
        self.update(bit, |_| false);
    }

    fn toggle(&self, bit: i32) {
        self.update(bit, |old| !old);
    }
}
