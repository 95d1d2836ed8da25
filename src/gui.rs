// src/gui.rs
use chrono::Local;
use eframe::egui;
use egui::Color32;
use egui_plot::{Line, Plot, PlotPoints, VLine};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::drivers::{DeviceCommand, StimulationParams, TriggerMarker};
use crate::session::{ForceDisplay, SessionController, SessionError};
use crate::types::{ConnectionMode, ConnectionTarget};
use crate::voluntary::VoluntarySession;

const CONSOLE_LINES: usize = 200;
const FLASH: Duration = Duration::from_millis(300);

/// Labels, rendered trigger lines and the console; what the session draws into.
#[derive(Default)]
struct ForcePanel {
    current: f64,
    max: f64,
    rendered_markers: Vec<u64>,
    last_trigger: Option<Instant>,
    console: Vec<String>,
}

impl ForceDisplay for ForcePanel {
    fn display_force(&mut self, current: f64, max: f64) {
        self.current = current;
        self.max = max;
    }

    fn add_marker(&mut self, marker: &TriggerMarker) {
        self.rendered_markers.push(marker.id);
        self.last_trigger = Some(Instant::now());
    }

    fn remove_marker(&mut self, marker: &TriggerMarker) {
        self.rendered_markers.retain(|id| *id != marker.id);
    }

    fn show_message(&mut self, message: &str) {
        self.console.push(message.to_owned());
        if self.console.len() > CONSOLE_LINES {
            self.console.remove(0);
        }
    }
}

impl ForcePanel {
    fn flashing(&self) -> bool {
        self.last_trigger.is_some_and(|t| t.elapsed() < FLASH)
    }
}

pub struct ForceSenseApp {
    session: SessionController,
    panel: ForcePanel,
    connection_mode: ConnectionMode,
    port: String,
    log_name: String,
    stimulation: StimulationParams,
    last_tick: Instant,

    voluntary: Option<VoluntarySession>,
    voluntary_open: bool,
    target_amplitude: f64,
    profile_path: String,
}

impl ForceSenseApp {
    pub fn new(config: AppConfig) -> Self {
        let log_name = config.auto_log_name(Local::now()).display().to_string();
        let port = config.default_port.clone();
        let target_amplitude = config.voluntary.default_amplitude;
        let stimulation = config.simulation.status();
        let mut panel = ForcePanel::default();
        panel.show_message("NMES force sense ready.");
        Self {
            session: SessionController::new(config),
            panel,
            connection_mode: ConnectionMode::Simulation,
            port,
            log_name,
            stimulation,
            last_tick: Instant::now(),
            voluntary: None,
            voluntary_open: false,
            target_amplitude,
            profile_path: String::new(),
        }
    }

    fn toggle_connection(&mut self) {
        if self.session.state().is_live() {
            self.session.disconnect();
            self.panel.show_message("Disconnected");
            return;
        }
        let target = match self.connection_mode {
            ConnectionMode::Simulation => ConnectionTarget::Simulation,
            ConnectionMode::Hardware => ConnectionTarget::Serial {
                port: self.port.trim().to_owned(),
            },
        };
        match self.session.connect(target) {
            Ok(()) => {
                let name = self.session.source_name().unwrap_or_default();
                self.panel.show_message(&format!("Connected to {name}"));
            }
            Err(e) => self.panel.show_message(&format!("Cannot open serial: {e}")),
        }
    }

    fn toggle_log(&mut self) {
        let path = PathBuf::from(self.log_name.trim());
        match self.session.toggle_log(&path) {
            Ok(true) => self
                .panel
                .show_message(&format!(">>> Logging started -> {}", path.display())),
            Ok(false) => self.panel.show_message(">>> Logging stopped."),
            Err(e) => self.panel.show_message(&format!("{e}")),
        }
    }

    fn report(&mut self, result: Result<(), SessionError>, done: &str) {
        match result {
            Ok(()) => self.panel.show_message(done),
            Err(e) => self.panel.show_message(&format!("{e}")),
        }
    }

    fn poll(&mut self) {
        let interval = self.session.config().tick_interval();
        if self.last_tick.elapsed() < interval {
            return;
        }
        self.last_tick = Instant::now();
        self.session.tick(&mut self.panel);
        if let Some(voluntary) = &mut self.voluntary {
            voluntary.pump();
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("NMES Force Sense");
        ui.separator();

        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.connection_mode, ConnectionMode::Simulation, "SIM");
            ui.selectable_value(&mut self.connection_mode, ConnectionMode::Hardware, "REAL");
        });
        if self.connection_mode == ConnectionMode::Hardware {
            ui.horizontal(|ui| {
                ui.label("Port");
                ui.text_edit_singleline(&mut self.port);
            });
        }
        let live = self.session.state().is_live();
        if ui.button(if live { "Disconnect" } else { "Connect" }).clicked() {
            self.toggle_connection();
        }
        ui.label(format!("State: {:?}", self.session.state()));

        ui.separator();
        ui.label(egui::RichText::new(format!("Force: {:.2}", self.panel.current)).size(22.0));
        ui.label(format!("Max: {:.2}", self.panel.max));
        ui.horizontal(|ui| {
            if ui.button("Reset max").clicked() {
                self.session.reset_max(&mut self.panel);
            }
            if ui.button("Tare").clicked() {
                let result = self.session.tare();
                self.report(result, "Sent tare");
            }
        });

        ui.separator();
        match self.session.log_path() {
            Some(path) => ui.colored_label(Color32::RED, format!("Logging to {}", path.display())),
            None => ui.label("Log file"),
        };
        ui.text_edit_singleline(&mut self.log_name);
        ui.horizontal(|ui| {
            if ui.button("Auto name").clicked() {
                let name = self.session.config().auto_log_name(Local::now());
                self.log_name = name.display().to_string();
            }
            let text = if self.session.is_logging() { "Stop logging" } else { "Start logging" };
            if ui.button(text).clicked() {
                self.toggle_log();
            }
        });

        ui.separator();
        ui.label("Stimulation");
        ui.horizontal(|ui| {
            ui.label("Hz");
            ui.add(egui::DragValue::new(&mut self.stimulation.frequency).clamp_range(0.0..=200.0));
            ui.label("on");
            ui.add(egui::DragValue::new(&mut self.stimulation.on_time).speed(0.1).clamp_range(0.0..=60.0));
            ui.label("off");
            ui.add(egui::DragValue::new(&mut self.stimulation.off_time).speed(0.1).clamp_range(0.0..=60.0));
        });
        if ui.button("Send").clicked() {
            let params = self.stimulation;
            let result = self.session.send_stimulation(params);
            let sent = DeviceCommand::SetStimulation(params).encode();
            self.report(result, &format!("Sent NMES: {}", sent.trim_end()));
        }

        ui.separator();
        if ui.button("Voluntary motion").clicked() && self.voluntary.is_none() {
            self.voluntary = Some(self.session.open_voluntary(&mut self.panel));
            self.voluntary_open = true;
        }

        ui.separator();
        ui.horizontal(|ui| {
            ui.label("Console");
            if ui.small_button("Clear").clicked() {
                self.panel.console.clear();
            }
        });
        egui::ScrollArea::vertical()
            .max_height(220.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.panel.console {
                    ui.monospace(line);
                }
            });
    }

    fn force_plot(&self, ui: &mut egui::Ui) {
        let buffer = self.session.buffer();
        let flashing = self.panel.flashing();
        let newest = self.panel.rendered_markers.last().copied();
        let label = match buffer.latest() {
            Some(force) => format!("Force {force:.2}"),
            None => "Force".to_owned(),
        };
        Plot::new("force_plot")
            .view_aspect(2.0)
            .include_x(0.0)
            .include_x(buffer.capacity() as f64)
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(buffer.plot_points()))
                        .name(label)
                        .color(Color32::WHITE),
                );
                for marker in buffer.markers() {
                    let width = if flashing && Some(marker.id) == newest { 4.0 } else { 1.0 };
                    plot_ui.vline(
                        VLine::new(marker.position as f64)
                            .color(Color32::YELLOW)
                            .width(width),
                    );
                }
            });
    }

    fn voluntary_window(&mut self, ctx: &egui::Context) {
        let Some(voluntary) = self.voluntary.as_mut() else {
            return;
        };
        let mut open = self.voluntary_open;
        let mut message = None;
        egui::Window::new("Voluntary motion")
            .open(&mut open)
            .default_size([640.0, 400.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Amplitude (N)");
                    ui.add(egui::DragValue::new(&mut self.target_amplitude).speed(0.05).clamp_range(0.0..=100.0));
                    if ui.button("Default target").clicked() {
                        voluntary.load_default_profile(self.target_amplitude);
                    }
                });
                ui.horizontal(|ui| {
                    ui.label("Log");
                    ui.text_edit_singleline(&mut self.profile_path);
                    if ui.button("Load target").clicked() {
                        let path = PathBuf::from(self.profile_path.trim());
                        message = Some(match voluntary.load_profile_from_log(&path) {
                            Ok(()) => format!(
                                "Loaded mean target profile ({:.2}s cycle)",
                                voluntary.profile().cycle_time()
                            ),
                            Err(e) => format!("Failed to load force profile: {e}"),
                        });
                    }
                });
                let title = match voluntary.cycle_time() {
                    Some(c) => format!("Cycle {:.2}s, {} cycles", c, voluntary.cycles()),
                    None => format!("Target peak {:.2} N", voluntary.profile().peak()),
                };
                ui.label(format!(
                    "{title}  |  force {:.2} N, max {:.2} N",
                    voluntary.current_force(),
                    voluntary.max_force()
                ));
                if voluntary.is_detached() {
                    ui.colored_label(Color32::YELLOW, "Main session closed");
                }
                Plot::new("voluntary_plot").view_aspect(1.6).show(ui, |plot_ui| {
                    plot_ui.line(
                        Line::new(PlotPoints::new(voluntary.profile().plot_points()))
                            .name("Target")
                            .color(Color32::RED),
                    );
                    plot_ui.line(
                        Line::new(PlotPoints::new(voluntary.trace_points()))
                            .name("Force")
                            .color(Color32::WHITE),
                    );
                    plot_ui.vline(VLine::new(0.0).color(Color32::YELLOW));
                });
            });
        if let Some(message) = message {
            self.panel.show_message(&message);
        }
        self.voluntary_open = open;
        if !open {
            // dropping the session ends its subscription
            self.voluntary = None;
        }
    }
}

impl eframe::App for ForceSenseApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll();
        if self.session.state().is_live() {
            ctx.request_repaint_after(self.session.config().tick_interval());
        }

        egui::SidePanel::left("controls").min_width(300.0).show(ctx, |ui| {
            self.controls(ui);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.force_plot(ui);
        });
        self.voluntary_window(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_tracks_rendered_markers() {
        let mut panel = ForcePanel::default();
        let a = TriggerMarker { id: 1, position: 3 };
        let b = TriggerMarker { id: 2, position: 3 };
        panel.add_marker(&a);
        panel.add_marker(&b);
        assert!(panel.flashing());
        panel.remove_marker(&a);
        assert_eq!(panel.rendered_markers, vec![2]);
    }

    #[test]
    fn console_is_bounded() {
        let mut panel = ForcePanel::default();
        for i in 0..(CONSOLE_LINES + 5) {
            panel.show_message(&i.to_string());
        }
        assert_eq!(panel.console.len(), CONSOLE_LINES);
        assert_eq!(panel.console[0], "5");
    }
}
