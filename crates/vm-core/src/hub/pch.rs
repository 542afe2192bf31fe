use crate::bus::{message, Interconnect, TerminalId};
use crate::hub::RouteError;
use crate::memory::Word;

/// Routes CPU requests to devices by base address and returns device
/// traffic to the CPU, one message per tick.
#[derive(Debug, Clone)]
pub struct PlatformControlHub {
    cpu: TerminalId,
    devices: Vec<(Word, TerminalId)>,
}

impl PlatformControlHub {
    /// Creates a hub whose upstream end is `cpu`.
    #[must_use]
    pub const fn new(cpu: TerminalId) -> Self {
        Self {
            cpu,
            devices: Vec::new(),
        }
    }

    /// Attaches a device that owns addresses from `base` up to the next device's base.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::NonMonotonicBase`] unless `base` is above every
    /// base attached so far.
    pub fn attach(&mut self, base: Word, terminal: TerminalId) -> Result<(), RouteError> {
        if let Some(&(previous, _)) = self.devices.last() {
            if base <= previous {
                return Err(RouteError::NonMonotonicBase { base, previous });
            }
        }
        self.devices.push((base, terminal));
        Ok(())
    }

    /// Attached devices as `(base, terminal)`, in address order.
    #[must_use]
    pub fn devices(&self) -> &[(Word, TerminalId)] {
        &self.devices
    }

    fn device_for(&self, address: Word) -> Option<TerminalId> {
        self.devices
            .iter()
            .rev()
            .find(|(base, _)| *base <= address)
            .map(|&(_, terminal)| terminal)
    }

    /// Forwards the pending CPU request, then the first pending device message.
    pub fn tick(&self, bus: &mut Interconnect) {
        if let Some(address) = bus.message(self.cpu).map(message::address) {
            match address.and_then(|address| self.device_for(address)) {
                Some(device) => {
                    if bus.forward(self.cpu, device) {
                        tracing::trace!(?address, device = device.index(), "pch forward");
                    }
                }
                None => {
                    tracing::warn!(?address, "pch dropped request below every device");
                    bus.clear(self.cpu);
                }
            }
        }

        if let Some(&(_, device)) = self
            .devices
            .iter()
            .find(|(_, terminal)| bus.has_message(*terminal))
        {
            bus.forward(device, self.cpu);
        }
    }
}
