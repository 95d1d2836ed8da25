// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod drivers;
mod gui;
mod recorder;
mod session;
mod types;
mod voluntary;
use anyhow::{anyhow, Context};
use eframe::egui;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = config::AppConfig::load().context("loading configuration")?;
    log::info!(
        "tick {} ms, plot length {}, {} baud",
        config.tick_interval_ms,
        config.plot_length,
        config.baud_rate
    );
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1200.0, 760.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title("NMES Force Sense");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "NMES Force Sense",
        options,
        Box::new(move |_cc| Box::new(gui::ForceSenseApp::new(config))),
    )
    .map_err(|e| anyhow!("GUI failed: {e}"))
}
