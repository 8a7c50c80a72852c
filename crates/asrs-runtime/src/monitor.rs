//! [`SensorMonitor`] – the diagnostic loop.
//!
//! Runs independently of the PLC.  Every period it lists the sensors
//! mounted on the ASRS shuttle, senses each one, and reports alignment and
//! the rail-end state.  A shuttle with no sensors is a wiring fault: the
//! monitor logs it and unregisters itself.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use asrs_hal::Scene;
use asrs_types::{BodyId, SensorCategory};
use tracing::{error, info, warn};

use crate::alignment::is_aligned;
use crate::config::TwinConfig;
use crate::scanner::Scanner;
use crate::scheduler::{SchedulerError, TimerHost};

/// Scheduler key of the diagnostic monitor.
pub const MONITOR_LOOP: &str = "monitor";

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub name: String,
    pub category: SensorCategory,
    /// Body the sensor overlaps, with its name when it has one.
    pub hit: Option<(BodyId, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    /// Local wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    pub readings: Vec<SensorReading>,
    pub end_of_rail: bool,
    pub aligned: Option<BodyId>,
}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[{}] SHUTTLE Sensor Readings ({} sensors found):",
            self.timestamp,
            self.readings.len()
        )?;
        for r in &self.readings {
            let status = match &r.hit {
                Some((_, name)) => format!("TRUE (Pallet: {name})"),
                None => "FALSE ()".to_string(),
            };
            writeln!(f, "  [{:<9}] {:<20} : {}", r.category.label(), r.name, status)?;
        }
        if self.end_of_rail {
            writeln!(f, "    END OF RAIL")?;
        }
        match self.aligned {
            Some(_) => write!(f, "  **PALLET ALIGNED**"),
            None => write!(f, "   PALLET NOT ALIGNED"),
        }
    }
}

type ReportSink = Box<dyn FnMut(&MonitorReport)>;

pub struct SensorMonitor {
    config: TwinConfig,
    sink: Option<ReportSink>,
    last: Option<MonitorReport>,
}

impl SensorMonitor {
    pub fn new(config: TwinConfig) -> Self {
        Self {
            config,
            sink: None,
            last: None,
        }
    }

    /// Hand every report to `sink` as well as the log.
    pub fn with_sink(mut self, sink: impl FnMut(&MonitorReport) + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn last_report(&self) -> Option<&MonitorReport> {
        self.last.as_ref()
    }

    /// Build a report, or `None` when the ASRS shuttle has no sensors.
    pub fn scan(&self, scene: &dyn Scene) -> Option<MonitorReport> {
        let cfg = &self.config;
        let scanner = Scanner::new(scene, cfg);
        let sensors = scanner.sensors_of(&cfg.asrs_shuttle);
        if sensors.is_empty() {
            return None;
        }

        let readings = sensors
            .into_iter()
            .map(|name| {
                let hit = scanner.sense(&name).map(|id| {
                    let label = scene.name(id).unwrap_or_default().to_string();
                    (id, label)
                });
                SensorReading {
                    category: SensorCategory::classify(&name),
                    name,
                    hit,
                }
            })
            .collect();

        Some(MonitorReport {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            readings,
            end_of_rail: scanner.sense(&cfg.rail_end_sensor).is_some(),
            aligned: is_aligned(&scanner, &cfg.alignment_sensors),
        })
    }

    /// Scheduler entry point.  Returns `None`, ending the monitor, when no
    /// sensors are found.
    pub fn tick(&mut self, scene: &dyn Scene) -> Option<Duration> {
        let Some(report) = self.scan(scene) else {
            if scene.find(&self.config.asrs_shuttle).is_none() {
                error!(shuttle = %self.config.asrs_shuttle, "shuttle not found");
            }
            error!("no sensors found, monitor stopping");
            return None;
        };

        info!(
            sensors = report.readings.len(),
            end_of_rail = report.end_of_rail,
            aligned = ?report.aligned,
            "sensor readings"
        );
        if let Some(sink) = self.sink.as_mut() {
            sink(&report);
        }
        self.last = Some(report);
        Some(self.config.monitor_interval())
    }
}

/// (Re)start the monitor; the first report comes one interval from now.
///
/// # Errors
///
/// Only if registration fails after the old monitor was removed.
pub fn start_monitor<S>(
    host: &mut TimerHost,
    monitor: Rc<RefCell<SensorMonitor>>,
    scene: Rc<RefCell<S>>,
) -> Result<(), SchedulerError>
where
    S: Scene + 'static,
{
    stop_monitor(host);
    let interval = monitor.borrow().config.monitor_interval();
    host.register(MONITOR_LOOP, interval, move || {
        match (monitor.try_borrow_mut(), scene.try_borrow()) {
            (Ok(mut monitor), Ok(scene)) => monitor.tick(&*scene),
            _ => {
                warn!("monitor busy, report skipped");
                Some(interval)
            }
        }
    })?;
    info!("sensor monitor started");
    Ok(())
}

/// Stop the monitor.  Returns whether it was running.
pub fn stop_monitor(host: &mut TimerHost) -> bool {
    match host.unregister(MONITOR_LOOP) {
        Ok(()) => {
            info!("monitor stopped");
            true
        }
        Err(_) => {
            info!("monitor not running");
            false
        }
    }
}
