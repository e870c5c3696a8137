//! Plain text status display on stdout.

use std::io::{self, Write};

use chrono::{DateTime, Local, Utc};
use netcheck::{InterfaceKey, Registry, StatusRecord, StatusView};

use crate::loader::LoadError;

const NO_DEVICES: &str = "No devices configured";
const NO_CONFIGURATION: &str = "No configuration found or file is empty";

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn badge(record: Option<&StatusRecord>) -> &'static str {
    match record {
        Some(record) if record.reachable => "Online",
        Some(_) => "Offline",
        None => "?",
    }
}

pub struct Presenter<W: Write> {
    out: W,
}

impl<W: Write> Presenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Redraw every device and interface
    pub fn full(&mut self, registry: &Registry, view: &StatusView) -> io::Result<()> {
        if registry.devices().is_empty() {
            writeln!(self.out, "{NO_DEVICES}")?;
            return self.out.flush();
        }

        let records = view.get_all();
        for device in registry.devices() {
            let count = device.interfaces.len();
            writeln!(
                self.out,
                "{} ({} interface{})",
                device.name,
                count,
                if count == 1 { "" } else { "s" }
            )?;

            for nic in &device.interfaces {
                let record = records.get(&InterfaceKey::new(device.name.clone(), nic.name.clone()));
                let last_check = record
                    .map(|r| format_time(r.checked_at))
                    .unwrap_or_else(|| "--:--:--".into());
                writeln!(
                    self.out,
                    "  {:<12} {:<39} {:<7} last check {}",
                    nic.name,
                    nic.address,
                    badge(record),
                    last_check
                )?;
            }
        }
        self.out.flush()
    }

    /// One line for a fresh result
    pub fn update(&mut self, record: &StatusRecord) -> io::Result<()> {
        write!(
            self.out,
            "[{}] {} {}",
            format_time(record.checked_at),
            record.key,
            badge(Some(record))
        )?;
        if let Some(error) = &record.error {
            write!(self.out, " ({error})")?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn load_error(&mut self, error: &LoadError) -> io::Result<()> {
        if error.is_missing_targets() {
            writeln!(self.out, "{NO_CONFIGURATION}")?;
        } else {
            writeln!(self.out, "Error: {error}")?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
