use chrono::{DateTime, Local};
use eframe::{App, egui};
use std::path::PathBuf;

use ite_core::merge::MergeOutcome;
use ite_core::model::Session;

#[derive(Default)]
struct State {
    session: Option<Session>,
    ledger_path: Option<PathBuf>,
    selected: Option<u32>,
    filter: String,
    edit_text: String,
    paste: String,
    pending: Option<MergeOutcome>,
    status: String,
    confirm_save: bool,
    last_backup_time: Option<DateTime<Local>>,
}

impl State {
    fn clear_file_cache(&mut self) {
        self.selected = None;
        self.edit_text.clear();
        self.pending = None;
        self.confirm_save = false;
    }

    /// Default ledger path next to the binary: `<stem>_TRADUZIR.txt`.
    fn default_ledger_path(path: &std::path::Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "texts".to_string());
        path.with_file_name(format!("{stem}_TRADUZIR.txt"))
    }
}

struct AppGui {
    state: State,
}

impl AppGui {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            state: State::default(),
        }
    }

    fn pick_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Impressions text table", &["eng"])
            .set_directory(".")
            .pick_file()
        else {
            return;
        };
        match Session::open(&path) {
            Ok(session) => {
                self.state.status = format!(
                    "Loaded {} ({} cells, {} warnings)",
                    session.file.format.name,
                    session.file.cells.len(),
                    session.warnings.len()
                );
                self.state.ledger_path = Some(State::default_ledger_path(&path));
                self.state.session = Some(session);
                self.state.clear_file_cache();
            }
            Err(ite_core::Error::UnknownFormat) => {
                // unknown signature: let the user force a dialect
                self.state.status =
                    "Unrecognized signature; use Open As for a specific dialect".into();
            }
            Err(e) => self.state.status = format!("Load error: {e}"),
        }
    }

    fn pick_file_as(&mut self, format: &'static ite_core::FormatDescriptor) {
        let Some(path) = rfd::FileDialog::new().set_directory(".").pick_file() else {
            return;
        };
        match Session::open_as(&path, format) {
            Ok(session) => {
                self.state.status = format!(
                    "Loaded as {} ({} cells)",
                    format.name,
                    session.file.cells.len()
                );
                self.state.ledger_path = Some(State::default_ledger_path(&path));
                self.state.session = Some(session);
                self.state.clear_file_cache();
            }
            Err(e) => self.state.status = format!("Load error: {e}"),
        }
    }

    fn select_cell(&mut self, id: u32) {
        self.state.selected = Some(id);
        if let Some(session) = &self.state.session
            && let Some(cell) = session.file.cell(id)
        {
            self.state.edit_text = cell
                .replacement
                .clone()
                .unwrap_or_else(|| cell.text.clone());
        }
    }

    fn export_ledger(&mut self) {
        let (Some(session), Some(ledger)) = (&self.state.session, &self.state.ledger_path) else {
            return;
        };
        match ite_core::export_to_path(&session.file, ledger) {
            Ok(0) => self.state.status = "Ledger already complete".into(),
            Ok(n) => self.state.status = format!("Appended {n} cells to {}", ledger.display()),
            Err(e) => self.state.status = format!("Export error: {e}"),
        }
    }

    fn reconcile_paste(&mut self) {
        let (Some(session), Some(ledger_path)) = (&self.state.session, &self.state.ledger_path)
        else {
            return;
        };
        let ledger = match std::fs::read_to_string(ledger_path) {
            Ok(s) => s,
            Err(e) => {
                self.state.status = format!("Ledger read error: {e}");
                return;
            }
        };
        let outcome = ite_core::reconcile(&session.file, &ledger, &self.state.paste);
        self.state.status = format!(
            "Reconciled: {} accepted, {} rejected, {} skipped",
            outcome.accepted.len(),
            outcome.rejected.len(),
            outcome.skipped
        );
        self.state.pending = Some(outcome);
    }

    fn apply_pending(&mut self) {
        let Some(outcome) = self.state.pending.take() else {
            return;
        };
        let (Some(session), Some(ledger_path)) =
            (self.state.session.as_mut(), &self.state.ledger_path)
        else {
            return;
        };
        if let Err(e) = std::fs::write(ledger_path, &outcome.ledger) {
            self.state.status = format!("Ledger write error: {e}");
            return;
        }
        match outcome.apply(&mut session.file) {
            Ok(n) => self.state.status = format!("Queued {n} translations; save to write them"),
            Err(e) => self.state.status = format!("Apply error: {e}"),
        }
    }

    fn save(&mut self) {
        let Some(session) = self.state.session.as_mut() else {
            return;
        };
        match session.save() {
            Ok(report) => {
                self.state.status = format!(
                    "Saved {} bytes, backup at {}",
                    report.bytes_written,
                    report.backup.display()
                );
                if !report.encode.lossy_cells.is_empty() {
                    self.state.status = format!(
                        "{} ({} cells written with lossy ? substitutes)",
                        self.state.status,
                        report.encode.lossy_cells.len()
                    );
                }
                self.state.last_backup_time = Some(Local::now());
            }
            Err(e) => self.state.status = format!("Save error: {e}"),
        }
    }
}

impl App for AppGui {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open .eng").clicked() {
                    self.pick_file();
                }
                ui.menu_button("Open As", |ui| {
                    for desc in ite_core::format::KNOWN {
                        if ui.button(desc.name).clicked() {
                            ui.close_menu();
                            self.pick_file_as(desc);
                        }
                    }
                });
                ui.separator();
                let modified = self
                    .state
                    .session
                    .as_ref()
                    .map(|s| s.file.modified_count())
                    .unwrap_or(0);
                ui.label(format!("{modified} modified cell(s)"));
                if ui.button("Save to .eng").clicked() && self.state.session.is_some() {
                    self.state.confirm_save = true;
                }
                if self.state.confirm_save {
                    ui.label("Backup then overwrite?");
                    if ui.button("Confirm").clicked() {
                        self.save();
                        self.state.confirm_save = false;
                    }
                    if ui.button("Cancel").clicked() {
                        self.state.confirm_save = false;
                    }
                }
                if let Some(time) = self.state.last_backup_time {
                    ui.label(format!("Last backup: {}", time.format("%Y-%m-%d %H:%M:%S")));
                }
            });
        });

        egui::SidePanel::left("cells").min_width(260.0).show(ctx, |ui| {
            ui.heading("Cells");
            ui.horizontal(|ui| {
                ui.label("Filter:");
                ui.text_edit_singleline(&mut self.state.filter);
                if ui.button("Clear").clicked() {
                    self.state.filter.clear();
                }
            });
            let mut clicked: Option<u32> = None;
            if let Some(session) = &self.state.session {
                let needle = self.state.filter.to_lowercase();
                egui::ScrollArea::vertical()
                    .id_source("cells_scroll")
                    .show(ui, |ui| {
                        for cell in &session.file.cells {
                            if !needle.is_empty() && !cell.text.to_lowercase().contains(&needle) {
                                continue;
                            }
                            let marker = if cell.modified { "*" } else { " " };
                            let mut label = format!("{}{} {}", marker, cell.id, cell.text);
                            if label.chars().count() > 48 {
                                label = label.chars().take(47).collect::<String>() + "…";
                            }
                            let sel = Some(cell.id) == self.state.selected;
                            if ui.selectable_label(sel, label).clicked() {
                                clicked = Some(cell.id);
                            }
                        }
                    });
            } else {
                ui.label("No file loaded");
            }
            if let Some(id) = clicked {
                self.select_cell(id);
            }
        });

        egui::TopBottomPanel::bottom("merge")
            .resizable(true)
            .default_height(230.0)
            .show(ctx, |ui| {
                ui.heading("Ledger & merge");
                if let Some(ledger) = &self.state.ledger_path {
                    ui.label(format!("Ledger: {}", ledger.display()));
                }
                ui.horizontal(|ui| {
                    if ui.button("Export missing cells").clicked() {
                        self.export_ledger();
                    }
                    if ui.button("Reconcile pasted batch").clicked() {
                        self.reconcile_paste();
                    }
                    let pending = self
                        .state
                        .pending
                        .as_ref()
                        .map(|o| o.accepted.len())
                        .unwrap_or(0);
                    if pending > 0 && ui.button(format!("Apply {pending} accepted")).clicked() {
                        self.apply_pending();
                    }
                });
                ui.label("Paste translated blocks:");
                egui::ScrollArea::vertical()
                    .id_source("paste_scroll")
                    .max_height(80.0)
                    .show(ui, |ui| {
                        ui.add(
                            egui::TextEdit::multiline(&mut self.state.paste)
                                .desired_rows(4)
                                .desired_width(f32::INFINITY),
                        );
                    });
                if let Some(outcome) = &self.state.pending
                    && !outcome.rejected.is_empty()
                {
                    ui.label("Rejected (these cells will NOT be merged):");
                    egui::ScrollArea::vertical()
                        .id_source("rejected_scroll")
                        .max_height(60.0)
                        .show(ui, |ui| {
                            for r in &outcome.rejected {
                                ui.label(format!("cell {}: {}", r.cell_id, r.reason));
                            }
                        });
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(session) = &self.state.session else {
                ui.label("Open a .eng file to start translating.");
                ui.separator();
                ui.label(&self.state.status);
                return;
            };
            let Some(cell) = self.state.selected.and_then(|id| session.file.cell(id)) else {
                ui.label(format!(
                    "{}: {} cells, {} index entries",
                    session.path.display(),
                    session.file.cells.len(),
                    session.file.entries.len()
                ));
                if !session.warnings.is_empty() {
                    ui.collapsing(format!("Warnings ({})", session.warnings.len()), |ui| {
                        for w in &session.warnings {
                            ui.label(w.to_string());
                        }
                    });
                }
                ui.separator();
                ui.label(&self.state.status);
                return;
            };

            ui.heading(format!("Cell {}", cell.id));
            ui.label(format!(
                "Offset 0x{:08X}, {} bytes, referenced by {} entr{}",
                session.file.file_offset(cell),
                cell.bytes.len(),
                cell.refs.len(),
                if cell.refs.len() == 1 { "y" } else { "ies" }
            ));
            ui.separator();
            ui.label("Original:");
            ui.monospace(&cell.text);
            ui.label("Translation:");
            ui.add(
                egui::TextEdit::multiline(&mut self.state.edit_text)
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );
            let cell_id = cell.id;
            let queued = cell.modified;
            ui.horizontal(|ui| {
                if ui.button("Queue translation").clicked()
                    && let Some(session) = self.state.session.as_mut()
                {
                    let text = self.state.edit_text.clone();
                    match session.file.apply_translation(cell_id, &text) {
                        Ok(()) => {
                            self.state.status =
                                format!("Cell {cell_id} queued; save to write it");
                        }
                        Err(e) => self.state.status = format!("{e}"),
                    }
                }
                if queued
                    && ui.button("Discard queued").clicked()
                    && let Some(session) = self.state.session.as_mut()
                    && let Some(cell) = session.file.cell_mut(cell_id)
                {
                    cell.replacement = None;
                    cell.modified = false;
                    self.state.status = format!("Cell {cell_id} reverted");
                }
            });
            ui.separator();
            ui.label(&self.state.status);
        });
    }
}

fn main() -> eframe::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::viewport::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([860.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Impressions Text Editor",
        native_options,
        Box::new(|cc| Ok(Box::new(AppGui::new(cc)))),
    )
}
